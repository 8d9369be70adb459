//! UI rendering methods for the minimap viewer.

use crate::MinimapApp;
use crate::colors::{self, to_color32};
use crate::constants::{KEY_ZOOM_FACTOR, LABEL_SHADOW_OFFSET, SIDEBAR_WIDTH};
use eframe::egui;
use egui_toast::ToastKind;
use minimap::constants::COLLAPSED_SIZE;
use minimap::coordinates::screen_to_world;
use minimap::{
    Coordinates, DangerLevel, FogPreset, FrameClock, LayerData, LocationId, LocationType,
    MinimapEvent, MoveIntent, PathType, PipelineKind, Viewport,
};

/// What was under the pointer when the context menu opened.
#[derive(Debug, Clone)]
pub struct ContextTarget {
    /// Surface pixels
    point: Coordinates,
    location: Option<LocationId>,
}

impl MinimapApp {
    /// Handles keyboard shortcuts for zoom, centering and panel size.
    pub fn handle_keyboard_input(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (toggle, center, zoom_in, zoom_out, reset) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::M),
                i.key_pressed(egui::Key::C),
                i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals),
                i.key_pressed(egui::Key::Minus),
                i.key_pressed(egui::Key::Num0),
            )
        });

        if toggle {
            self.prefs.expanded = !self.prefs.expanded;
        }
        if center {
            self.center_on_player();
        }
        if zoom_in {
            self.controller.zoom_by(KEY_ZOOM_FACTOR, None);
        }
        if zoom_out {
            self.controller.zoom_by(1.0 / KEY_ZOOM_FACTOR, None);
        }
        if reset {
            self.reset_view();
        }
    }

    fn center_on_player(&mut self) {
        if !self.controller.center_on_current() {
            self.notify(ToastKind::Warning, "Current location unknown", 3.0);
        }
    }

    /// Zoom 1, centered on the player or else the middle of the layer.
    fn reset_view(&mut self) {
        let vp = self.controller.viewport();
        self.controller.set_viewport(Viewport { zoom: 1.0, ..vp });
        if self.controller.center_on_current() {
            return;
        }
        if let Some(bounds) = self.controller.active_layer().and_then(LayerData::bounds) {
            self.controller.center_on(bounds.center());
        }
    }

    /// Renders the bottom status bar with controls hint and frame stats.
    pub fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Scroll: Zoom | Drag: Pan | +/-: Zoom | 0: Reset | C: Center | M: Expand");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let perf = self.controller.performance();
                    if self.prefs.show_stats && perf.is_enabled() {
                        ui.monospace(perf.summary());
                        ui.separator();
                    }
                    ui.label(format!("Map: {}", self.snapshot_source));
                    if let Some(location) = &self.hovered_location {
                        ui.separator();
                        ui.strong(&location.name);
                    }
                });
            });
        });
    }

    /// Renders the left sidebar panel.
    pub fn show_sidebar(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("sidebar")
            .exact_width(SIDEBAR_WIDTH)
            .resizable(false)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.show_sidebar_content(ui);
                });
            });
    }

    fn show_sidebar_content(&mut self, ui: &mut egui::Ui) {
        ui.add_space(4.0);

        // Layers section
        ui.strong("Layers");
        ui.separator();

        let mut layers: Vec<(String, String, i32)> = self
            .controller
            .snapshot()
            .layers
            .iter()
            .map(|layer| (layer.id.clone(), layer.name.clone(), layer.level))
            .collect();
        layers.sort_by(|a, b| b.2.cmp(&a.2));

        if layers.is_empty() {
            ui.label("No layers loaded");
        } else {
            let active = self.controller.active_layer().map(|layer| layer.id.clone());
            let player_layer = self
                .controller
                .snapshot()
                .current_location
                .as_ref()
                .map(|c| c.layer.clone());
            for (id, name, level) in &layers {
                let marker = if player_layer.as_deref() == Some(id.as_str()) {
                    " •"
                } else {
                    ""
                };
                let text = format!("{name} ({level:+}){marker}");
                if ui
                    .selectable_label(active.as_deref() == Some(id.as_str()), text)
                    .clicked()
                {
                    self.controller.set_active_layer(id);
                }
            }
        }

        ui.add_space(12.0);

        // Display section
        ui.strong("Display");
        ui.separator();

        let before = self.prefs.clone();
        ui.checkbox(&mut self.prefs.expanded, "Expanded (M)");
        ui.checkbox(&mut self.prefs.show_grid, "Grid");
        ui.checkbox(&mut self.prefs.show_labels, "Labels");
        ui.checkbox(&mut self.prefs.show_fog, "Fog of war");
        ui.checkbox(&mut self.prefs.show_stats, "Frame stats");
        if ui.button("Center on me (C)").clicked() {
            self.center_on_player();
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label("Fog");
            egui::ComboBox::from_id_salt("fog_preset")
                .selected_text(self.prefs.fog_preset.name())
                .show_ui(ui, |ui| {
                    for preset in FogPreset::ALL {
                        ui.selectable_value(&mut self.prefs.fog_preset, preset, preset.name());
                    }
                });
        });
        ui.horizontal(|ui| {
            ui.label("Pipeline");
            ui.radio_value(&mut self.prefs.pipeline, PipelineKind::Direct, "Direct");
            ui.radio_value(&mut self.prefs.pipeline, PipelineKind::Layered, "Layered");
        });
        if self.prefs != before {
            self.apply_preferences();
        }

        if self.prefs.expanded {
            ui.add_space(12.0);
            self.show_legend(ui);
        }

        ui.add_space(12.0);
        self.show_location_details(ui);
    }

    fn show_legend(&self, ui: &mut egui::Ui) {
        let theme = &self.controller.config().theme;

        ui.strong("Legend");
        ui.separator();

        for location_type in LocationType::ALL {
            Self::legend_circle(
                ui,
                to_color32(theme.location_color(location_type)),
                location_type.label(),
            );
        }
        ui.add_space(6.0);
        for danger in DangerLevel::ALL {
            Self::legend_ring(ui, to_color32(theme.danger_color(danger)), danger.label());
        }
        ui.add_space(6.0);
        for path_type in PathType::ALL {
            Self::legend_line(ui, to_color32(theme.path_color(path_type)), path_type.label());
        }
    }

    fn legend_circle(ui: &mut egui::Ui, color: egui::Color32, label: &str) {
        ui.horizontal(|ui| {
            let (rect, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
            ui.painter().circle_filled(rect.center(), 5.0, color);
            ui.label(label);
        });
    }

    fn legend_ring(ui: &mut egui::Ui, color: egui::Color32, label: &str) {
        ui.horizontal(|ui| {
            let (rect, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
            ui.painter()
                .circle_stroke(rect.center(), 4.5, egui::Stroke::new(2.0, color));
            ui.label(label);
        });
    }

    fn legend_line(ui: &mut egui::Ui, color: egui::Color32, label: &str) {
        ui.horizontal(|ui| {
            let (rect, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
            ui.painter().line_segment(
                [rect.left_center(), rect.right_center()],
                egui::Stroke::new(2.0, color),
            );
            ui.label(label);
        });
    }

    /// Details for the selected location, with the route cost from the player.
    fn show_location_details(&mut self, ui: &mut egui::Ui) {
        ui.strong("Selected");
        ui.separator();

        let Some(location) = self.selected_location.clone() else {
            ui.label("Click a marker to inspect it");
            return;
        };

        ui.label(egui::RichText::new(&location.name).heading());
        ui.label(format!("Type: {}", location.location_type.label()));
        ui.label(format!("Danger: {}", location.danger_level.label()));
        if location.discovered {
            ui.label(format!("Explored: {:.0}%", location.exploration()));
        } else {
            ui.weak("Undiscovered");
        }

        let snapshot = self.controller.snapshot();
        let from = snapshot.current_location.as_ref();
        let route = from.and_then(|current| {
            snapshot
                .layer(&current.layer)?
                .discovered_route(&current.location_id, &location.id)
        });
        match (from, route) {
            (Some(current), _) if current.location_id == location.id => {
                ui.label("You are here");
            }
            (_, Some(connection)) => {
                ui.label(format!(
                    "{} from here, cost {}",
                    connection.path_type.label(),
                    connection.cost
                ));
            }
            _ => {
                ui.weak("No discovered route");
            }
        }

        if ui.button("Travel here").clicked() {
            self.controller.request_move(&location.id);
        }
    }

    /// Renders the central panel containing the minimap.
    pub fn show_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.controller.snapshot().layers.is_empty() {
                ui.centered_and_justified(|ui| {
                    ui.label("Snapshot has no layers.");
                });
                return;
            }
            self.show_minimap(ui, ctx);
        });
    }

    fn show_minimap(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let size = if self.prefs.expanded {
            ui.available_size()
        } else {
            egui::vec2(COLLAPSED_SIZE[0], COLLAPSED_SIZE[1])
        };
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
        self.controller
            .resize(f64::from(rect.width()), f64::from(rect.height()));

        self.handle_minimap_input(ui, rect, &response);
        self.show_context_menu(&response);

        if let Some(report) = self.controller.tick(FrameClock::now()) {
            self.labels = report.labels;
            if let Some(surface) = self.controller.surface() {
                let image = egui::ColorImage::from_rgba_premultiplied(
                    [surface.width() as usize, surface.height() as usize],
                    surface.data(),
                );
                match &mut self.texture {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("minimap", image, egui::TextureOptions::LINEAR));
                    }
                }
            }
        }

        let painter = ui.painter_at(rect);
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        for label in &self.labels {
            let pos = rect.min + egui::vec2(label.x, label.y);
            let font_id = egui::FontId::proportional(label.font_size);

            // Shadow
            painter.text(
                pos + egui::vec2(LABEL_SHADOW_OFFSET, LABEL_SHADOW_OFFSET),
                egui::Align2::CENTER_TOP,
                &label.text,
                font_id.clone(),
                colors::LABEL_SHADOW,
            );

            // Main text
            painter.text(
                pos,
                egui::Align2::CENTER_TOP,
                &label.text,
                font_id,
                to_color32(label.color),
            );
        }

        let border = if self.prefs.expanded {
            colors::PANEL_BORDER_EXPANDED
        } else {
            colors::PANEL_BORDER
        };
        painter.rect_stroke(
            rect,
            4.0,
            egui::Stroke::new(2.0, border),
            egui::StrokeKind::Inside,
        );
    }

    /// Feeds pointer and wheel input to the controller in surface coordinates.
    fn handle_minimap_input(
        &mut self,
        ui: &egui::Ui,
        rect: egui::Rect,
        response: &egui::Response,
    ) {
        let (hover, pressed, released, scroll) = ui.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.raw_scroll_delta.y,
            )
        });
        let inside = hover.is_some_and(|p| rect.contains(p));
        let local = hover.map(|p| {
            Coordinates::new(f64::from(p.x - rect.min.x), f64::from(p.y - rect.min.y))
        });

        match local {
            Some(pos) if inside || self.controller.is_dragging() => {
                if pressed && inside {
                    self.controller.pointer_down(pos);
                }
                self.controller.pointer_move(pos);
                if inside && scroll != 0.0 {
                    self.controller.wheel(f64::from(scroll.signum()), pos);
                }
            }
            _ => self.controller.pointer_leave(),
        }
        if released {
            self.controller.pointer_up();
        }

        if response.secondary_clicked()
            && let Some(point) = local
        {
            self.context_target = Some(ContextTarget {
                point,
                location: self.controller.location_at(point).map(|l| l.id.clone()),
            });
        }
    }

    fn show_context_menu(&mut self, response: &egui::Response) {
        let Some(target) = self.context_target.clone() else {
            return;
        };
        response.context_menu(|ui| {
            if let Some(id) = &target.location
                && ui.button("Travel here").clicked()
            {
                self.controller.request_move(id);
                ui.close();
            }
            if ui.button("Center here").clicked() {
                let world = screen_to_world(target.point, &self.controller.viewport());
                self.controller.center_on(world);
                ui.close();
            }
        });
    }

    /// Reacts to everything the controller queued this frame.
    pub fn process_events(&mut self) {
        for event in self.controller.drain_events() {
            match event {
                MinimapEvent::LocationSelected(location) => {
                    log::debug!("Selected {}", location.id);
                    self.selected_location = Some(location);
                }
                MinimapEvent::LocationHovered(location) => {
                    self.hovered_location = location;
                }
                MinimapEvent::ViewportChanged(viewport) => {
                    log::trace!(
                        "Viewport at ({:.1}, {:.1}) zoom {:.2}",
                        viewport.x,
                        viewport.y,
                        viewport.zoom
                    );
                }
                MinimapEvent::MoveRequested(intent) => self.handle_move_request(intent),
            }
        }
    }

    fn handle_move_request(&mut self, intent: MoveIntent) {
        let name = intent.target.name.clone();
        let Some(from) = intent.from.as_deref() else {
            self.notify(ToastKind::Warning, "Current location unknown", 3.0);
            return;
        };
        if from == intent.target.id {
            self.notify(ToastKind::Info, format!("Already at {name}"), 3.0);
            return;
        }
        let cost = self
            .controller
            .snapshot()
            .layer(&intent.layer)
            .and_then(|layer| layer.discovered_route(from, &intent.target.id))
            .map(|connection| connection.cost);
        match cost {
            Some(cost) => {
                log::info!("Move requested: {from} -> {} (cost {cost})", intent.target.id);
                self.notify(
                    ToastKind::Info,
                    format!("Travelling to {name} (cost {cost})"),
                    4.0,
                );
            }
            None => {
                self.notify(
                    ToastKind::Error,
                    format!("No discovered route to {name}"),
                    4.0,
                );
            }
        }
    }
}
