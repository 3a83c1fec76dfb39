// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// macroquad 窗口显示
///
/// 渲染线程通过 WindowSurface 送帧, 主线程运行 WindowLoop (macroquad 要求在主线程)。
/// Q / Esc / 关闭窗口 → 用户退出。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use macroquad::color::{Color, BLACK, GREEN, WHITE};
use macroquad::input::{is_key_pressed, is_quit_requested, prevent_quit, KeyCode};
use macroquad::math::vec2;
use macroquad::text::draw_text;
use macroquad::texture::{draw_texture_ex, DrawTextureParams, FilterMode, Image, Texture2D};
use macroquad::window::{clear_background, next_frame, screen_height, screen_width};

use super::annotate::{AnnotatedFrame, FPS_ORIGIN, TEXT_SCALE};
use super::surface::{RenderSurface, SurfaceEvent};
use crate::error::Result;
use crate::pipeline::{PipelineHandle, StopReason};

/// 渲染线程一侧
pub struct WindowSurface {
    tx: Option<Sender<AnnotatedFrame>>,
    quit: Arc<AtomicBool>,
}

/// 主线程一侧
pub struct WindowLoop {
    rx: Receiver<AnnotatedFrame>,
    quit: Arc<AtomicBool>,
    texture: Option<Texture2D>,
    last: Option<AnnotatedFrame>,
}

pub fn window_surface() -> (WindowSurface, WindowLoop) {
    let (tx, rx) = bounded(1);
    let quit = Arc::new(AtomicBool::new(false));
    (
        WindowSurface {
            tx: Some(tx),
            quit: quit.clone(),
        },
        WindowLoop {
            rx,
            quit,
            texture: None,
            last: None,
        },
    )
}

impl RenderSurface for WindowSurface {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<SurfaceEvent> {
        if self.quit.load(Ordering::Acquire) {
            return Ok(SurfaceEvent::Quit);
        }
        let Some(tx) = &self.tx else {
            return Ok(SurfaceEvent::Quit);
        };
        // 窗口已关闭
        if tx.send(frame.clone()).is_err() {
            return Ok(SurfaceEvent::Quit);
        }
        Ok(SurfaceEvent::Continue)
    }

    fn release(&mut self) {
        self.tx = None;
    }
}

fn to_color(rgb: image::Rgb<u8>) -> Color {
    Color::from_rgba(rgb[0], rgb[1], rgb[2], 255)
}

impl WindowLoop {
    /// 运行到流水线停止
    pub async fn run(mut self, handle: PipelineHandle) {
        prevent_quit();
        loop {
            if is_key_pressed(KeyCode::Q) || is_key_pressed(KeyCode::Escape) || is_quit_requested() {
                self.quit.store(true, Ordering::Release);
                handle.stop(StopReason::UserQuit);
            }
            if !handle.is_running() {
                break;
            }

            // 只显示最新一帧
            let mut latest = None;
            while let Ok(frame) = self.rx.try_recv() {
                latest = Some(frame);
            }
            if let Some(frame) = latest {
                self.upload(frame);
            }

            self.draw();
            next_frame().await;
        }
    }

    fn upload(&mut self, frame: AnnotatedFrame) {
        let (w, h) = frame.image.dimensions();
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for px in frame.image.pixels() {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }

        // 只在分辨率变化时重建纹理
        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != w as f32 || tex.height() != h as f32,
            None => true,
        };
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w as u16, h as u16, &rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            tex.update(&Image {
                bytes: rgba,
                width: w as u16,
                height: h as u16,
            });
        }
        self.last = Some(frame);
    }

    fn draw(&self) {
        clear_background(BLACK);
        let (Some(texture), Some(frame)) = (&self.texture, &self.last) else {
            return;
        };

        let scale_x = screen_width() / texture.width();
        let scale_y = screen_height() / texture.height();
        draw_texture_ex(
            texture,
            0.0,
            0.0,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(screen_width(), screen_height())),
                ..Default::default()
            },
        );

        // 框已画进图像; 没有字体时文字在这里画
        if frame.text_rendered {
            return;
        }
        for a in &frame.annotations {
            let x = a.bbox.xmin() * scale_x;
            let y = a.bbox.ymin() * scale_y;
            draw_text(&a.caption, x, (y - 10.0).max(TEXT_SCALE), TEXT_SCALE + 2.0, to_color(a.color));
        }
        draw_text(
            &frame.fps_caption(),
            FPS_ORIGIN.0 as f32,
            FPS_ORIGIN.1 as f32,
            TEXT_SCALE + 6.0,
            GREEN,
        );
    }
}
