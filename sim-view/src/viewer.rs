//! Interactive spin-particle viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the [`Simulation`], the two
//! frame pacers and a per-zone sprite cache, and implements
//! [`eframe::App`] to render and control the simulation through an egui UI.

use std::{collections::BTreeMap, time::Duration};

use eframe::App;
use glam::Vec2;
use spinfield_core::{
    Boundary, Config, Distance, SimError, Simulation, Spin,
    grid::ResizeReport,
    particle::Particle,
    schedule::TickPacer,
    types::ZoneCoord,
};

/// Particles scattered over the pane at startup.
const INITIAL_PARTICLES: usize = 300;
/// Spin components of painted and populated particles (one per colour channel).
const SPIN_DIMS: usize = 3;
/// Minimum pointer travel, in pixels, between two painted particles.
const PAINT_SPACING: f32 = 5.0;
/// Share of the central area taken by the simulation pane.
const PANE_FRACTION: f32 = 2.0 / 3.0;
/// Pane assumed until the first frame reports the real one.
const INITIAL_PANE: Vec2 = Vec2::new(600.0, 400.0);
const PARTICLE_RADIUS: f32 = 1.5;

/// Cached drawing data for one particle, in unit-square coordinates so the
/// cache survives pane resizes.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Sprite {
    pos: Vec2,
    color: egui::Color32,
}

impl Sprite {
    /// Spin colour with the red channel replaced by the particle's heat.
    ///
    /// Sprites are only rebuilt for dirty zones, and heat alone does not make
    /// a zone dirty, so a resting particle keeps the shade it had when its
    /// zone was last redrawn.
    fn of(particle: &Particle) -> Self {
        let [_, g, b] = particle.spin.color();
        Self {
            pos: particle.pos,
            color: egui::Color32::from_rgb(particle.heat_shade(), g, b),
        }
    }
}

/// Main application state for the interactive viewer.
///
/// The typical per-frame update is:
/// 1. Handle UI interactions / input and resize the grid if the pane changed.
/// 2. Ask the tick pacer how many ticks are due and run them.
/// 3. If the draw pacer fires, refresh the sprite cache from the zones the
///    simulation reports as dirty.
/// 4. Paint every cached sprite.
///
/// ### Fields
/// - `sim` - The simulation being shown.
/// - `cfg` - Editable copy of the parameters, pushed to `sim` on change.
/// - `ticks` / `draws` - Pacers for the tick and the draw loop.
/// - `sprites` - Sprites per zone, as of the last flush.
/// - `pane` - Pane size the grid was last sized for, in pixels.
/// - `paint_rgb` - Colour (and so spin) of painted particles.
/// - `last_paint` - Screen position of the last painted particle during a drag.
pub struct Viewer {
    sim: Simulation,
    cfg: Config,

    ticks: TickPacer,
    draws: TickPacer,
    last_time: Option<f64>,

    sprites: BTreeMap<ZoneCoord, Vec<Sprite>>,
    dirty_last_flush: usize,
    pane: Vec2,
    last_resize: Option<ResizeReport>,

    paint_rgb: [u8; 3],
    last_paint: Option<egui::Pos2>,
    populate_count: usize,

    status: Option<String>,
}

impl Viewer {
    /// Creates a viewer around a fresh simulation scattered with
    /// [`INITIAL_PARTICLES`] random particles.
    ///
    /// ### Errors
    /// Any error from validating `cfg`.
    pub fn new(cfg: Config) -> Result<Self, SimError> {
        let mut sim = Simulation::new(cfg.clone(), INITIAL_PANE)?;
        sim.populate(INITIAL_PARTICLES, SPIN_DIMS)?;
        let ticks = TickPacer::new(cfg.ticks_per_second, cfg.max_catch_up)?;
        let draws = TickPacer::new(cfg.frames_per_second, 1)?;

        Ok(Self {
            sim,
            cfg,
            ticks,
            draws,
            last_time: None,
            sprites: BTreeMap::new(),
            dirty_last_flush: 0,
            pane: INITIAL_PANE,
            last_resize: None,
            paint_rgb: [230, 120, 40],
            last_paint: None,
            populate_count: 100,
            status: None,
        })
    }

    /// The simulation pane: [`PANE_FRACTION`] of `available`, centred.
    fn pane_rect(available: egui::Rect) -> egui::Rect {
        egui::Rect::from_center_size(available.center(), available.size() * PANE_FRACTION)
    }

    /// Converts a unit-square position to screen-space inside `pane`.
    fn unit_to_screen(p: Vec2, pane: egui::Rect) -> egui::Pos2 {
        egui::pos2(
            pane.min.x + p.x * pane.width(),
            pane.min.y + p.y * pane.height(),
        )
    }

    /// Converts a screen-space position back to unit-square coordinates.
    ///
    /// This is the inverse of [`Viewer::unit_to_screen`] (up to floating
    /// point rounding).
    fn screen_to_unit(p: egui::Pos2, pane: egui::Rect) -> Vec2 {
        Vec2::new(
            (p.x - pane.min.x) / pane.width(),
            (p.y - pane.min.y) / pane.height(),
        )
    }

    /// Spin matching the paint colour.
    fn paint_spin(&self) -> Result<Spin, SimError> {
        Spin::new(self.paint_rgb.iter().map(|&c| f32::from(c) / 255.0).collect())
    }

    fn report(&mut self, err: SimError) {
        log::warn!("{err}");
        self.status = Some(err.to_string());
    }

    /// Grows the grid to a new pane size; a no-op when the size is unchanged.
    fn resize_pane(&mut self, size: Vec2) {
        if size == self.pane || size.x < 1.0 || size.y < 1.0 {
            return;
        }
        match self.sim.resize(size) {
            Ok(report) => {
                self.pane = size;
                if report.changed() {
                    let (cols, rows) = report.to;
                    self.sprites.retain(|c, _| c.col < cols && c.row < rows);
                    self.last_resize = Some(report);
                }
            }
            Err(err) => self.report(err),
        }
    }

    /// Adds a particle with the paint spin under the pointer, unless the
    /// previous one of this drag is closer than [`PAINT_SPACING`].
    ///
    /// ### Returns
    /// `true` if a particle was added.
    fn paint_at(&mut self, screen: egui::Pos2, pane: egui::Rect) -> bool {
        if !pane.contains(screen) {
            return false;
        }
        if let Some(last) = self.last_paint
            && last.distance(screen) < PAINT_SPACING
        {
            return false;
        }
        let added = self
            .paint_spin()
            .and_then(|spin| self.sim.add(spin, Some(Self::screen_to_unit(screen, pane))));
        match added {
            Ok(_) => {
                self.last_paint = Some(screen);
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    /// Runs the ticks due after `elapsed` wall time.
    fn advance(&mut self, elapsed: Duration) {
        for _ in 0..self.ticks.advance(elapsed) {
            self.sim.tick();
        }
        if let Some(fault) = self.sim.take_faults().pop() {
            self.status = Some(fault.to_string());
        }
        if self.draws.advance(elapsed) > 0 {
            self.refresh_sprites();
        }
    }

    /// Single step for the Step button; runs even while paused.
    fn step_once(&mut self) {
        self.sim.step();
        self.refresh_sprites();
    }

    /// Re-reads the zones changed since the last flush into the cache.
    fn refresh_sprites(&mut self) {
        let views = self.sim.drawable_zones();
        self.dirty_last_flush = views.len();
        for view in views {
            let sprites = view.particles().map(Sprite::of).collect();
            self.sprites.insert(view.coord(), sprites);
        }
    }

    fn reset(&mut self) {
        self.sim.reset();
        self.ticks.reset();
        self.status = None;
        self.refresh_sprites();
    }

    fn populate(&mut self) {
        if let Err(err) = self.sim.populate(self.populate_count, SPIN_DIMS) {
            self.report(err);
        }
    }

    /// Pushes edited parameters into the simulation and the pacers.
    fn apply_config(&mut self) {
        if self.cfg == *self.sim.config() {
            return;
        }
        let applied = self
            .cfg
            .validate()
            .and_then(|()| self.sim.update_config(self.cfg.clone()))
            .and_then(|()| self.ticks.set_rate(self.cfg.ticks_per_second))
            .and_then(|()| self.draws.set_rate(self.cfg.frames_per_second));
        match applied {
            Ok(()) => log::debug!("parameters updated"),
            Err(err) => {
                self.cfg = self.sim.config().clone();
                self.report(err);
            }
        }
    }

    /// Helper to draw a labeled `f32` [`egui::DragValue`].
    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Helper to draw a labeled `f64` [`egui::DragValue`].
    fn labeled_drag_f64(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f64,
        range: std::ops::RangeInclusive<f64>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the top panel UI (run controls, stepping, population).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let paused = self.sim.is_paused();
                if ui.button(if paused { "▶ Run" } else { "⏸ Pause" }).clicked() {
                    self.sim.toggle();
                }
                if ui.button("Step").clicked() {
                    self.step_once();
                }
                if ui.button("Reset").clicked() {
                    self.reset();
                }

                ui.separator();
                ui.add(
                    egui::DragValue::new(&mut self.populate_count)
                        .range(1..=5000)
                        .speed(10.0),
                );
                if ui.button("Populate").clicked() {
                    self.populate();
                }

                ui.separator();
                ui.label("Paint");
                ui.color_edit_button_srgb(&mut self.paint_rgb);
            });
        });
    }

    /// Builds the bottom status bar (counts, grid, timings, faults).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let grid = self.sim.grid();
                let stats = self.sim.stats();
                ui.label(format!("particles = {}", self.sim.len()));
                ui.label(format!("grid = {}x{}", grid.cols(), grid.rows()));
                ui.label(format!("dirty = {}", self.dirty_last_flush));
                ui.label(format!(
                    "pairs = {}, forces = {}",
                    stats.last.pairs, stats.last.contributions
                ));
                ui.separator();
                for timer in stats.timers() {
                    ui.label(format!(
                        "{} = {:.0} µs",
                        timer.name(),
                        timer.average().as_secs_f64() * 1e6
                    ));
                }
                ui.separator();
                ui.label(format!("dropped = {}", self.ticks.dropped()));
                ui.label(format!("faults = {}", stats.total_faults()));
                if let Some(report) = self.last_resize
                    && !report.consistent
                {
                    ui.colored_label(egui::Color32::RED, "grid inconsistent after resize");
                }
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.colored_label(egui::Color32::YELLOW, status.as_str());
                }
            });
        });
    }

    /// Builds the right-hand panel for the simulation parameters.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Config");

                ui.separator();
                ui.label("Forces");
                Self::labeled_drag_f32(ui, "speed:", &mut self.cfg.speed, 0.0..=1.0, 0.001);
                Self::labeled_drag_f32(ui, "spread:", &mut self.cfg.strength, -1.0..=1.0, 0.001);
                Self::labeled_drag_f32(ui, "curve:", &mut self.cfg.curve, 0.1..=4.0, 0.01);
                Self::labeled_drag_f32(ui, "max speed:", &mut self.cfg.max_speed, 0.0001..=0.1, 0.0001);

                let mut custom_cutoff = self.cfg.interaction_cutoff.is_some();
                if ui.checkbox(&mut custom_cutoff, "custom cutoff").changed() {
                    self.cfg.interaction_cutoff = custom_cutoff.then(|| self.sim.effective_cutoff());
                }
                if let Some(cutoff) = self.cfg.interaction_cutoff.as_mut() {
                    Self::labeled_drag_f32(ui, "cutoff:", cutoff, 0.001..=1.0, 0.001);
                }

                ui.separator();
                ui.label("Friction and heat");
                Self::labeled_drag_f32(ui, "air:", &mut self.cfg.air_friction, 0.0..=1.0, 0.001);
                Self::labeled_drag_f32(ui, "particle:", &mut self.cfg.particle_friction, 0.0..=1.0, 0.001);
                Self::labeled_drag_f32(ui, "heat speed:", &mut self.cfg.heat_speed, -1.0..=1.0, 0.001);

                ui.separator();
                ui.label("Space");
                ui.horizontal(|ui| {
                    ui.radio_value(&mut self.cfg.boundary, Boundary::Wrap, "wrap");
                    ui.radio_value(&mut self.cfg.boundary, Boundary::Clamp, "clamp");
                });
                egui::ComboBox::from_label("distance")
                    .selected_text(self.cfg.metric.to_string())
                    .show_ui(ui, |ui| {
                        for preset in Distance::PRESETS {
                            ui.selectable_value(&mut self.cfg.metric, preset, preset.to_string());
                        }
                    });

                ui.separator();
                ui.label("Rates");
                Self::labeled_drag_f64(ui, "ticks/s:", &mut self.cfg.ticks_per_second, 1.0..=240.0, 1.0);
                Self::labeled_drag_f64(ui, "draws/s:", &mut self.cfg.frames_per_second, 1.0..=240.0, 1.0);

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = Config {
                        cell_size: self.cfg.cell_size,
                        ..Config::default()
                    };
                }
            });
        self.apply_config();
    }

    /// Builds the central panel where the particles are drawn and painted.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let pane = Self::pane_rect(ui.available_rect_before_wrap());
            self.resize_pane(Vec2::new(pane.width().floor(), pane.height().floor()));

            let response = ui.allocate_rect(pane, egui::Sense::click_and_drag());
            let painter = ui.painter_at(pane);

            if (response.clicked() || response.dragged())
                && let Some(pos) = response.interact_pointer_pos()
            {
                self.paint_at(pos, pane);
            }
            if response.drag_stopped() || response.clicked() {
                self.last_paint = None;
            }

            painter.rect_filled(pane, 0.0, egui::Color32::BLACK);
            for sprite in self.sprites.values().flatten() {
                painter.circle_filled(
                    Self::unit_to_screen(sprite.pos, pane),
                    PARTICLE_RADIUS,
                    sprite.color,
                );
            }
        });
    }

    /// Space toggles the simulation, R resets it.
    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (space, r) = ctx.input(|i| (i.key_pressed(egui::Key::Space), i.key_pressed(egui::Key::R)));
        if space {
            self.sim.toggle();
        }
        if r {
            self.reset();
        }
    }
}

impl App for Viewer {
    /// eframe callback that advances the simulation and builds all UI
    /// panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = ctx.input(|i| i.time);
        let elapsed = self.last_time.map_or(0.0, |last| (now - last).max(0.0));
        self.last_time = Some(now);

        self.handle_keys(ctx);
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);

        self.advance(Duration::from_secs_f64(elapsed));
        ctx.request_repaint();
    }
}
