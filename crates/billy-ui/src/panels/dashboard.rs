//! Analytics dashboard: summary cards and daily line charts.

use egui::{self, pos2, Pos2, Rect, RichText, ScrollArea, Sense, Stroke, Vec2};
use billy_core::analytics::DashboardData;
use crate::state::DashboardState;
use crate::theme::*;

const CHART_HEIGHT: f32 = 160.0;

/// Returns true when the user asked for a reload.
pub fn dashboard_panel(ui: &mut egui::Ui, state: &DashboardState) -> bool {
    let mut refresh = false;

    ui.horizontal(|ui| {
        ui.heading(RichText::new("Analytics").color(TEXT_PRIMARY).strong());
        if ui
            .add_enabled(!state.loading, egui::Button::new("Refresh"))
            .clicked()
        {
            refresh = true;
        }
        if state.loading {
            ui.spinner();
        }
    });
    if let Some(error) = &state.error {
        ui.label(RichText::new(error).color(ERROR).small());
    }
    ui.separator();

    let Some(data) = &state.data else {
        if !state.loading {
            ui.label(RichText::new("No data loaded").color(TEXT_SECONDARY).italics());
        }
        return refresh;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            summary_cards(ui, data);
            ui.add_space(12.0);
            charts(ui, data);
        });

    refresh
}

fn summary_cards(ui: &mut egui::Ui, data: &DashboardData) {
    let s = &data.summary;
    ui.horizontal_wrapped(|ui| {
        card(ui, "Sessions", &s.total_sessions.to_string());
        card(ui, "Users", &s.total_users.to_string());
        card(ui, "Avg. session", &format!("{:.1} min", s.average_session_minutes));
        card(ui, "Prompts (7d)", &s.prompts_last_week.to_string());
        card(ui, "Prompts / day", &format!("{:.1}", s.prompts_per_day));
    });
}

fn card(ui: &mut egui::Ui, title: &str, value: &str) {
    egui::Frame::default()
        .fill(BG_SECONDARY)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            ui.set_min_width(120.0);
            ui.label(RichText::new(title).color(TEXT_SECONDARY).small());
            ui.label(RichText::new(value).color(TEXT_PRIMARY).heading().strong());
        });
}

fn charts(ui: &mut egui::Ui, data: &DashboardData) {
    let days: Vec<String> = data.accuracy.iter().map(|p| p.date.format("%m/%d").to_string()).collect();
    let mut accuracy = vec![("Overall".to_string(), data.accuracy.iter().map(|p| p.total).collect())];
    let buckets: std::collections::BTreeSet<&String> =
        data.accuracy.iter().flat_map(|p| p.buckets.keys()).collect();
    for bucket in buckets {
        let values = data
            .accuracy
            .iter()
            .map(|p| p.buckets.get(bucket).copied().unwrap_or(0.0))
            .collect();
        accuracy.push((bucket.clone(), values));
    }
    line_chart(ui, "Accuracy (%)", data.accuracy_trend, &days, &accuracy);

    let days: Vec<String> = data.active_users.iter().map(|p| p.date.format("%m/%d").to_string()).collect();
    let users = vec![(
        "Active users".to_string(),
        data.active_users.iter().map(|p| p.active_users as f64).collect(),
    )];
    line_chart(ui, "Active users", data.active_users_trend, &days, &users);

    let days: Vec<String> = data.durations.iter().map(|p| p.date.format("%m/%d").to_string()).collect();
    let durations = vec![
        ("Daily".to_string(), data.durations.iter().map(|p| p.average_minutes).collect()),
        ("7 days".to_string(), data.durations.iter().map(|p| p.last_week).collect()),
        ("14 days".to_string(), data.durations.iter().map(|p| p.last_two_weeks).collect()),
        ("30 days".to_string(), data.durations.iter().map(|p| p.last_month).collect()),
    ];
    line_chart(ui, "Session length (min)", data.duration_trend, &days, &durations);
}

/// "+12.5%" / "-3.0%" / "n/a"
pub fn trend_text(trend: Option<f64>) -> String {
    match trend {
        Some(t) if t >= 0.0 => format!("+{:.1}%", t),
        Some(t) => format!("{:.1}%", t),
        None => "n/a".to_string(),
    }
}

/// Map a series onto `rect`, `max` at the top edge.
pub fn scale_points(values: &[f64], max: f64, rect: Rect) -> Vec<Pos2> {
    let steps = values.len().saturating_sub(1).max(1) as f32;
    let max = if max > 0.0 { max } else { 1.0 };
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = rect.left() + rect.width() * i as f32 / steps;
            let y = rect.bottom() - rect.height() * (*v / max).clamp(0.0, 1.0) as f32;
            pos2(x, y)
        })
        .collect()
}

fn line_chart(
    ui: &mut egui::Ui,
    title: &str,
    trend: Option<f64>,
    labels: &[String],
    series: &[(String, Vec<f64>)],
) {
    egui::Frame::default()
        .fill(BG_SECONDARY)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new(title).color(TEXT_PRIMARY).strong());
                let color = match trend {
                    Some(t) if t < 0.0 => ERROR,
                    Some(_) => SUCCESS,
                    None => TEXT_SECONDARY,
                };
                ui.label(RichText::new(trend_text(trend)).color(color).small());
            });

            if labels.is_empty() {
                ui.label(RichText::new("No data for this period").color(TEXT_SECONDARY).small());
                return;
            }

            let (response, painter) =
                ui.allocate_painter(Vec2::new(ui.available_width(), CHART_HEIGHT), Sense::hover());
            let rect = response.rect.shrink(8.0);
            painter.rect_stroke(
                rect,
                0.0,
                Stroke::new(1.0, BG_SURFACE),
                egui::StrokeKind::Inside,
            );

            let max = series
                .iter()
                .flat_map(|(_, values)| values.iter().copied())
                .fold(0.0_f64, f64::max);
            for (i, (_, values)) in series.iter().enumerate() {
                let points = scale_points(values, max, rect);
                let color = chart_color(i);
                if points.len() == 1 {
                    painter.circle_filled(points[0], 3.0, color);
                } else {
                    painter.add(egui::Shape::line(points, Stroke::new(2.0, color)));
                }
            }

            ui.horizontal_wrapped(|ui| {
                if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
                    ui.label(RichText::new(format!("{} - {}", first, last)).color(TEXT_SECONDARY).small());
                }
                for (i, (name, _)) in series.iter().enumerate() {
                    ui.label(RichText::new(format!("■ {}", name)).color(chart_color(i)).small());
                }
            });
        });
}
