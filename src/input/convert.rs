// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
// YUV420P → RGB (BT.601)

#![cfg_attr(not(feature = "ffmpeg"), allow(dead_code))]

use image::RgbImage;

/// 三个平面及其行跨度; U/V 平面宽高各为 Y 的一半 (向上取整)
pub struct Yuv420Planes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub y_stride: usize,
    pub uv_stride: usize,
}

pub fn yuv420p_to_rgb(planes: &Yuv420Planes<'_>, width: u32, height: u32) -> Option<RgbImage> {
    let (w, h) = (width as usize, height as usize);
    let uv_rows = h.div_ceil(2);
    let uv_cols = w.div_ceil(2);
    if w == 0
        || h == 0
        || planes.y_stride < w
        || planes.uv_stride < uv_cols
        || planes.y.len() < planes.y_stride * (h - 1) + w
        || planes.u.len() < planes.uv_stride * (uv_rows - 1) + uv_cols
        || planes.v.len() < planes.uv_stride * (uv_rows - 1) + uv_cols
    {
        return None;
    }

    let mut rgb = vec![0u8; w * h * 3];
    for (y, row) in rgb.chunks_exact_mut(w * 3).enumerate() {
        let y_row = &planes.y[y * planes.y_stride..];
        let uv_offset = (y / 2) * planes.uv_stride;
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let y_val = y_row[x] as f32;
            let u_val = planes.u[uv_offset + x / 2] as f32 - 128.0;
            let v_val = planes.v[uv_offset + x / 2] as f32 - 128.0;

            px[0] = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
            px[1] = (y_val - 0.344 * u_val - 0.714 * v_val).clamp(0.0, 255.0) as u8;
            px[2] = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
        }
    }
    RgbImage::from_raw(width, height, rgb)
}
