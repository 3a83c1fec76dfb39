// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 摄像头输入地址
//!
//! 按平台选择 FFmpeg 输入格式: DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

/// 当前平台的摄像头输入格式
pub fn platform_format() -> &'static str {
    #[cfg(target_os = "windows")]
    let format = "dshow"; // DirectShow

    #[cfg(target_os = "macos")]
    let format = "avfoundation"; // AVFoundation

    #[cfg(target_os = "linux")]
    let format = "v4l2"; // Video4Linux2

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    let format = "video4linux2"; // 默认

    format
}

/// FFmpeg 摄像头输入: 格式 + 设备地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInput {
    pub format: &'static str,
    pub url: String,
}

impl CameraInput {
    /// `device` 为设备序号或设备名
    pub fn for_platform(device: &str) -> Self {
        Self::with_format(platform_format(), device)
    }

    /// dshow 只认设备名, 序号要先换成名字 (见 `device_index`)
    pub fn with_format(format: &'static str, device: &str) -> Self {
        let url = match (format, device_index(device)) {
            ("dshow", _) => format!("video={}", device),
            ("v4l2" | "video4linux2", Some(index)) => format!("/dev/video{}", index),
            _ => device.to_string(),
        };
        Self { format, url }
    }

    pub fn needs_device_name(&self) -> bool {
        self.format == "dshow"
    }
}

/// 纯数字的设备参数按序号处理
pub fn device_index(device: &str) -> Option<usize> {
    device.trim().parse().ok()
}
