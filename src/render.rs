//! Render targets for the dashboard model.
//!
//! Every `render` call replaces the previous content of each region.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;

use crate::dashboard::{AlertView, Banner, CardBody, DashboardModel, EventPreview, HazardCard};
use crate::logging::{self, obj, v_int, v_str, Domain};

pub trait Renderer {
    fn render(&mut self, model: &DashboardModel);
    fn set_visible(&mut self, visible: bool);
    fn set_loading(&mut self, loading: bool);
    /// Blocking, user-facing message.
    fn alert(&mut self, message: &str);
}

/// Minimal HTML escaping for text and attribute content.
pub fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn fmt_number(n: f64) -> String {
    format!("{}", n)
}

// =============================================================================
// HTML
// =============================================================================

/// Renders into three HTML regions (banner, alerts, cards).
#[derive(Debug, Default)]
pub struct HtmlRenderer {
    pub banner_class: String,
    pub banner_html: String,
    pub alerts_html: String,
    pub cards_html: String,
    pub visible: bool,
    pub loading: bool,
    pub alerts_raised: Vec<String>,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn banner_region(b: &Banner) -> (String, String) {
        let class = format!("score-banner {}", b.level.css_class());
        let elevation = b
            .elevation
            .as_ref()
            .map(|e| format!(" ({} moh.)", esc(e)))
            .unwrap_or_default();
        let html = format!(
            "<div class=\"score-number\">{}</div>\
             <div class=\"score-label\">{}</div>\
             <div class=\"score-summary\">{}</div>\
             <div class=\"score-address\">{}{}</div>",
            fmt_number(b.score),
            esc(&b.label),
            esc(&b.summary),
            esc(&b.address),
            elevation
        );
        (class, html)
    }

    fn alert_card(a: &AlertView) -> String {
        format!(
            "<div class=\"alert-card {}\">\
             <div class=\"alert-event\">{} — {}</div>\
             <div class=\"alert-desc\">{}</div></div>",
            a.severity.css_class(),
            esc(&a.event),
            esc(&a.severity_text),
            esc(&a.description)
        )
    }

    fn hazard_card(c: &HazardCard) -> String {
        let mut html = format!(
            "<div class=\"hazard-card {}\" data-hazard=\"{}\"><div class=\"hazard-name\">{}</div>",
            c.level.css_class(),
            esc(&c.id),
            esc(&c.name)
        );
        match &c.body {
            CardBody::Failed { error } => {
                let _ = write!(html, "<div class=\"hazard-error\">{}</div>", esc(error));
            }
            CardBody::Scored {
                score,
                level_label,
                details,
                events,
            } => {
                let _ = write!(
                    html,
                    "<div class=\"hazard-score\">{}</div>\
                     <div class=\"hazard-level\">{}</div>\
                     <div class=\"hazard-details\">{}</div>",
                    fmt_number(*score),
                    esc(level_label),
                    esc(details)
                );
                if let Some(preview) = events {
                    html.push_str(&Self::event_list(preview));
                }
            }
        }
        html.push_str("</div>");
        html
    }

    fn event_list(p: &EventPreview) -> String {
        let mut html = String::from("<ul class=\"hazard-events\">");
        for item in &p.items {
            let tags: String = item
                .tags
                .iter()
                .map(|t| format!(" <span class=\"event-tag\">{}</span>", esc(t)))
                .collect();
            let _ = write!(
                html,
                "<li><b>{}</b> {} · {:.0} m{}</li>",
                esc(&item.kind),
                esc(&item.date),
                item.distance_m,
                tags
            );
        }
        if let Some(line) = p.remaining_line() {
            let _ = write!(html, "<li class=\"event-more\">{}</li>", esc(&line));
        }
        html.push_str("</ul>");
        html
    }

    /// Standalone page with the current regions, for snapshots.
    pub fn page(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"no\"><head><meta charset=\"utf-8\"><title>Risiko</title></head>\
             <body><section id=\"dashboard\"{}>\
             <div id=\"score-banner\" class=\"{}\">{}</div>\
             <div id=\"weather-alerts\">{}</div>\
             <div id=\"hazard-cards\">{}</div>\
             </section></body></html>\n",
            if self.visible { "" } else { " hidden" },
            esc(&self.banner_class),
            self.banner_html,
            self.alerts_html,
            self.cards_html
        )
    }
}

impl Renderer for HtmlRenderer {
    fn render(&mut self, model: &DashboardModel) {
        let (class, html) = Self::banner_region(&model.banner);
        self.banner_class = class;
        self.banner_html = html;
        self.alerts_html = model.alerts.iter().map(Self::alert_card).collect();
        self.cards_html = model.cards.iter().map(Self::hazard_card).collect();
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn alert(&mut self, message: &str) {
        self.alerts_raised.push(message.to_string());
    }
}

pub fn write_html_page(path: &Path, renderer: &HtmlRenderer) -> io::Result<()> {
    std::fs::write(path, renderer.page())
}

// =============================================================================
// Plain text
// =============================================================================

/// Terminal renderer. Output is written as it is produced.
pub struct TextRenderer<W: Write> {
    out: W,
    write_errors: u64,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, write_errors: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Failed writes so far; each one is logged and otherwise ignored.
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    fn check(&mut self, op: &str, res: io::Result<()>) {
        if let Err(e) = res {
            self.write_errors += 1;
            logging::warn(
                Domain::Dashboard,
                "render.io_failed",
                obj(&[
                    ("op", v_str(op)),
                    ("error", v_str(&e.to_string())),
                    ("failures", v_int(self.write_errors)),
                ]),
            );
        }
    }

    fn write_model(&mut self, model: &DashboardModel) -> io::Result<()> {
        let b = &model.banner;
        writeln!(self.out, "== {} ==", b.address)?;
        match &b.elevation {
            Some(e) => writeln!(self.out, "{} ({} moh.)", b.label, e)?,
            None => writeln!(self.out, "{}", b.label)?,
        }
        writeln!(self.out, "Score: {} [{}]", fmt_number(b.score), b.level.as_str())?;
        if !b.summary.is_empty() {
            writeln!(self.out, "{}", b.summary)?;
        }

        if !model.alerts.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "Farevarsler:")?;
            for a in &model.alerts {
                writeln!(self.out, "  ! {} — {}", a.event, a.severity_text)?;
                if !a.description.is_empty() {
                    writeln!(self.out, "    {}", a.description)?;
                }
            }
        }

        writeln!(self.out)?;
        for card in &model.cards {
            match &card.body {
                CardBody::Failed { error } => {
                    writeln!(self.out, "  {:<28} {}", card.name, error)?;
                }
                CardBody::Scored {
                    score,
                    level_label,
                    details,
                    events,
                } => {
                    writeln!(self.out, "  {:<28} {:>3}  {}", card.name, fmt_number(*score), level_label)?;
                    if !details.is_empty() {
                        writeln!(self.out, "      {}", details)?;
                    }
                    if let Some(p) = events {
                        for item in &p.items {
                            let mut line = format!("      - {} {} · {:.0} m", item.kind, item.date, item.distance_m);
                            if !item.tags.is_empty() {
                                line.push_str(&format!(" [{}]", item.tags.join(", ")));
                            }
                            writeln!(self.out, "{}", line)?;
                        }
                        if let Some(more) = p.remaining_line() {
                            writeln!(self.out, "      {}", more)?;
                        }
                    }
                }
            }
        }
        self.out.flush()
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, model: &DashboardModel) {
        let res = self.write_model(model);
        self.check("render", res);
    }

    fn set_visible(&mut self, _visible: bool) {}

    fn set_loading(&mut self, loading: bool) {
        if loading {
            let res = writeln!(self.out, "Henter risikovurdering …");
            self.check("loading", res);
        }
    }

    fn alert(&mut self, message: &str) {
        let res = writeln!(self.out, "FEIL: {}", message);
        self.check("alert", res);
    }
}
