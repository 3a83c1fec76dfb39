// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 渲染显示 (Renderer)
///
/// - Renderer:      检测框 + 标签 + FPS 画到帧上
/// - FpsCounter:    每秒统计一次显示帧率
/// - RenderSurface: 显示端 (无头 / 图片目录 / macroquad 窗口)
pub mod annotate;
pub mod fps;
pub mod surface;
#[cfg(feature = "display")]
pub mod window;

pub use annotate::{class_color, AnnotatedFrame, Annotation, Renderer};
pub use fps::FpsCounter;
pub use surface::{HeadlessSurface, ImageDirSurface, RenderSurface, SurfaceEvent, SurfaceGuard};
#[cfg(feature = "display")]
pub use window::{window_surface, WindowLoop, WindowSurface};
