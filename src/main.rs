use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use eframe::egui;
use tile_curate::cli::CliArgs;
use tile_curate::{
    DirectorySink, ExportState, Notice, NoticeLevel, Session, Settings, TileIndex, ZoomDirection,
};

/// How long one UI frame may spend writing tiles before repainting progress.
const EXPORT_FRAME_BUDGET: Duration = Duration::from_millis(30);

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

// ── App ─────────────────────────────────────────────────────────────────────

struct CurateApp {
    session: Session,
    texture: Option<egui::TextureHandle>,
    texture_generation: u64,
    frame_rect: Option<egui::Rect>,

    export_sink: Option<DirectorySink>,
    export_progress: Option<(usize, usize)>,
    notice: Option<Notice>,
}

impl CurateApp {
    fn new(session: Session) -> Self {
        Self {
            session,
            texture: None,
            texture_generation: 0,
            frame_rect: None,
            export_sink: None,
            export_progress: None,
            notice: None,
        }
    }

    /// Re-uploads the rendered frame when the engine produced a new one.
    fn ensure_texture(&mut self, ctx: &egui::Context, canvas_rect: egui::Rect) {
        let Some(frame) = self.session.render() else {
            self.frame_rect = None;
            return;
        };
        let origin = canvas_rect.min + egui::vec2(frame.origin.0 as f32, frame.origin.1 as f32);
        self.frame_rect = Some(egui::Rect::from_min_size(
            origin,
            egui::vec2(frame.size.0 as f32, frame.size.1 as f32),
        ));
        if self.texture.is_some() && frame.generation == self.texture_generation {
            return;
        }

        let size = [frame.image.width() as usize, frame.image.height() as usize];
        let pixels = frame.image.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::NEAREST),
            None => {
                self.texture =
                    Some(ctx.load_texture("frame", color_image, egui::TextureOptions::NEAREST));
            }
        }
        self.texture_generation = frame.generation;
    }

    fn to_screen(&self, canvas_rect: egui::Rect, x: f64, y: f64) -> egui::Pos2 {
        let (sx, sy) = self.session.viewport().image_to_screen(x, y);
        canvas_rect.min + egui::vec2(sx as f32, sy as f32)
    }

    fn draw_grid(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let grid = self.session.grid();
        if grid.is_empty() {
            return;
        }
        let size = grid.tile_size() as f64;
        let (right, bottom) = (grid.tiles_x() as f64 * size, grid.tiles_y() as f64 * size);
        let stroke = egui::Stroke::new(1.0, egui::Color32::from_black_alpha(140));

        for ix in 0..=grid.tiles_x() {
            let x = ix as f64 * size;
            painter.line_segment(
                [
                    self.to_screen(canvas_rect, x, 0.0),
                    self.to_screen(canvas_rect, x, bottom),
                ],
                stroke,
            );
        }
        for iy in 0..=grid.tiles_y() {
            let y = iy as f64 * size;
            painter.line_segment(
                [
                    self.to_screen(canvas_rect, 0.0, y),
                    self.to_screen(canvas_rect, right, y),
                ],
                stroke,
            );
        }
    }

    fn draw_hover(&self, painter: &egui::Painter, canvas_rect: egui::Rect, tile: TileIndex) {
        let rect = self.session.tile_screen_rect(tile);
        let rect = egui::Rect::from_min_max(
            canvas_rect.min + egui::vec2(rect.min_x as f32, rect.min_y as f32),
            canvas_rect.min + egui::vec2(rect.max_x as f32, rect.max_y as f32),
        );
        painter.rect_stroke(
            rect,
            0.0,
            egui::Stroke::new(2.0, egui::Color32::from_rgb(255, 220, 0)),
            egui::StrokeKind::Inside,
        );
    }

    fn palette_ui(&mut self, ui: &mut egui::Ui) {
        let store = self.session.store();
        let current = store.current_color();
        let num_colors = store.palette().num_colors();
        let mut picked = None;

        for label in 0..=num_colors {
            let (fill, caption) = match store.palette().color(label) {
                Some([r, g, b]) => (
                    egui::Color32::from_rgb(r, g, b),
                    tile_curate::Palette::bucket_name(label).unwrap_or_default(),
                ),
                None => (egui::Color32::WHITE, "✕".to_string()),
            };
            let stroke = if label == current {
                egui::Stroke::new(3.0, egui::Color32::BLACK)
            } else {
                egui::Stroke::new(1.0, egui::Color32::DARK_GRAY)
            };
            let button = egui::Button::new(egui::RichText::new(caption).color(egui::Color32::BLACK))
                .fill(fill)
                .stroke(stroke)
                .min_size(egui::vec2(32.0, 26.0));
            if ui.add(button).clicked() {
                picked = Some(label);
            }
        }

        if let Some(label) = picked {
            self.session.select_color(label);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        const DIGITS: [egui::Key; 10] = [
            egui::Key::Num0,
            egui::Key::Num1,
            egui::Key::Num2,
            egui::Key::Num3,
            egui::Key::Num4,
            egui::Key::Num5,
            egui::Key::Num6,
            egui::Key::Num7,
            egui::Key::Num8,
            egui::Key::Num9,
        ];
        let pressed = ctx.input(|i| DIGITS.iter().position(|&k| i.key_pressed(k)));
        if let Some(digit) = pressed {
            // Keys follow the swatch captions, which are zero-based.
            self.session.select_color(digit as u8 + 1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.session.select_color(0);
        }
    }

    fn start_export(&mut self) {
        if let ExportState::Writing { total, .. } = self.session.request_export() {
            self.begin_writing(total);
        }
    }

    fn begin_writing(&mut self, total: usize) {
        self.export_sink = Some(self.session.directory_sink());
        self.export_progress = Some((0, total));
    }

    /// Writes tiles for at most one frame budget, then yields so the
    /// progress bar can repaint.
    fn pump_export(&mut self, ctx: &egui::Context) {
        let Some(sink) = self.export_sink.as_mut() else {
            return;
        };
        let started = Instant::now();
        loop {
            match self.session.export_step(sink) {
                Ok(ExportState::Writing { written, total }) => {
                    self.export_progress = Some((written, total));
                    if started.elapsed() >= EXPORT_FRAME_BUDGET {
                        ctx.request_repaint();
                        return;
                    }
                }
                Ok(_) | Err(_) => break,
            }
        }
        self.export_sink = None;
        self.export_progress = None;
    }

    fn export_windows(&mut self, ctx: &egui::Context) {
        if let ExportState::Confirming { labeled, total } = *self.session.export_state() {
            let mut answer = None;
            egui::Window::new("Export")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(format!(
                        "Only {labeled} of {total} tiles were colored. Do you want to proceed?"
                    ));
                    ui.horizontal(|ui| {
                        if ui.button("OK").clicked() {
                            answer = Some(true);
                        }
                        if ui.button("Cancel").clicked() {
                            answer = Some(false);
                        }
                    });
                });
            if let Some(accepted) = answer {
                if let ExportState::Writing { total, .. } = self.session.confirm_export(accepted) {
                    self.begin_writing(total);
                }
            }
        }

        if let Some((written, total)) = self.export_progress {
            egui::Window::new("Progress...")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    let fraction = written as f32 / total.max(1) as f32;
                    ui.add(
                        egui::ProgressBar::new(fraction)
                            .desired_width(300.0)
                            .text(format!("{written} / {total}")),
                    );
                });
        }

        if self.notice.is_none() {
            self.notice = self.session.take_notice();
        }
        let mut dismissed = false;
        if let Some(notice) = &self.notice {
            let title = match notice.level {
                NoticeLevel::Info => "Info",
                NoticeLevel::Warning => "Warning",
                NoticeLevel::Error => "Error",
            };
            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(notice.message.as_str());
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
        }
        if dismissed {
            self.notice = None;
        }
    }

    fn canvas_input(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let origin = response.rect.min;
        let local = |p: egui::Pos2| ((p.x - origin.x) as f64, (p.y - origin.y) as f64);

        match response.hover_pos() {
            Some(pos) => {
                let (x, y) = local(pos);
                self.session.pointer_moved(x, y);
            }
            None => {
                self.session.pointer_left();
            }
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = local(pos);
                self.session.click(x, y);
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_delta();
            self.session.drag(delta.x as f64, delta.y as f64);
        }

        let scroll = ctx.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 {
            if let Some(pos) = response.hover_pos() {
                let (x, y) = local(pos);
                let direction = if scroll > 0.0 {
                    ZoomDirection::In
                } else {
                    ZoomDirection::Out
                };
                self.session.wheel(x, y, direction);
            }
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for CurateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let busy = self.session.export_state() != &ExportState::Idle || self.notice.is_some();
        if !busy {
            self.handle_shortcuts(ctx);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_enabled_ui(!busy, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Clear").clicked() {
                        self.session.clear();
                    }
                    if ui.button("Export Tiles").clicked() {
                        self.start_export();
                    }
                    if ui.button("Fit").clicked() {
                        self.session.fit();
                    }
                    ui.separator();
                    self.palette_ui(ui);
                    ui.separator();
                    let store = self.session.store();
                    ui.label(format!("{} / {} tiles", store.count(), store.total()));
                    ui.label(format!("Zoom: {:.0}%", self.session.viewport().scale() * 100.0));
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;
            self.session
                .resize_canvas(canvas_rect.width() as f64, canvas_rect.height() as f64);

            if !busy {
                self.canvas_input(ctx, &response);
            }

            painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));
            self.ensure_texture(ctx, canvas_rect);
            if let (Some(texture), Some(rect)) = (&self.texture, self.frame_rect) {
                painter.image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
            self.draw_grid(&painter, canvas_rect);
            if let Some(tile) = self.session.hovered() {
                self.draw_hover(&painter, canvas_rect, tile);
            }
        });

        self.pump_export(ctx);
        self.export_windows(ctx);
        if self.export_sink.is_some() {
            ctx.request_repaint();
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Open image")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let settings = match Settings::resolve(&args) {
        Ok(settings) => settings,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let Some(image_path) = args.image.clone().or_else(pick_image) else {
        log::error!("No image selected");
        return ExitCode::FAILURE;
    };

    let session = match Session::open(&image_path, settings) {
        Ok(session) => session,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let title = format!(
        "tile-curate — {}",
        image_path
            .file_name()
            .unwrap_or_default()
            .to_str()
            .unwrap_or("")
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    if let Err(err) = eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(CurateApp::new(session)))),
    ) {
        log::error!("Failed to run eframe: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
