use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use riskdash::app::{run_session, AppController, LookupOutcome, UiEvent};
use riskdash::client::retry::{RetryConfig, Retrying};
use riskdash::client::{HttpRiskClient, RiskApi};
use riskdash::config::Config;
use riskdash::logging::{self, obj, v_int, v_str, Domain};
use riskdash::map::{BoundingBox, LogMapView, MapController, BASE_LAYERS, DEFAULT_CENTER, OVERLAYS};
use riskdash::render::{write_html_page, HtmlRenderer, TextRenderer};
use riskdash::search::{Key, ResultItem, SearchController, SearchView};

const USAGE: &str = "usage:
  riskdash search <query>
  riskdash risk <query> [--pick N] [--html PATH]
  riskdash interactive
  riskdash layers [LAT LON]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::info(
        Domain::System,
        "startup",
        obj(&[
            ("api_base", v_str(&cfg.api_base)),
            ("debounce_ms", v_int(cfg.debounce_ms)),
            ("retry_max", v_int(u64::from(cfg.retry_max))),
        ]),
    );

    let client = Retrying::new(
        HttpRiskClient::new(&cfg)?,
        RetryConfig::with_max_retries(cfg.retry_max),
    );

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("search") => {
            let query = args.get(2).ok_or_else(|| anyhow!(USAGE))?;
            cmd_search(&client, query).await
        }
        Some("risk") => {
            let query = args.get(2).ok_or_else(|| anyhow!(USAGE))?;
            let opts = RiskOpts::parse(&args[3..])?;
            cmd_risk(&client, query, opts).await
        }
        Some("interactive") => cmd_interactive(client, &cfg).await,
        Some("layers") => cmd_layers(&args[2..]),
        _ => bail!(USAGE),
    }
}

async fn cmd_search<C: RiskApi>(client: &C, query: &str) -> Result<()> {
    let results = client.search(query).await.context("search failed")?;
    if results.is_empty() {
        println!("Ingen treff.");
    }
    for (i, addr) in results.iter().enumerate() {
        let item = ResultItem::from(addr);
        println!("{:>2}. {}  ({})", i, item.title, item.subtitle.trim());
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
struct RiskOpts {
    pick: usize,
    html: Option<PathBuf>,
}

impl RiskOpts {
    fn parse(args: &[String]) -> Result<Self> {
        let mut opts = RiskOpts::default();
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--pick" => {
                    let n = it.next().ok_or_else(|| anyhow!("--pick needs a value"))?;
                    opts.pick = n.parse().with_context(|| format!("bad --pick value '{}'", n))?;
                }
                "--html" => {
                    let p = it.next().ok_or_else(|| anyhow!("--html needs a path"))?;
                    opts.html = Some(PathBuf::from(p));
                }
                other => bail!("unknown option '{}'\n{}", other, USAGE),
            }
        }
        Ok(opts)
    }
}

async fn cmd_risk<C: RiskApi>(client: &C, query: &str, opts: RiskOpts) -> Result<()> {
    let results = client.search(query).await.context("search failed")?;
    let address = results
        .get(opts.pick)
        .cloned()
        .ok_or_else(|| anyhow!("no result #{} for '{}' ({} found)", opts.pick, query, results.len()))?;

    let outcome = match &opts.html {
        Some(path) => {
            let mut app = AppController::new(HtmlRenderer::new(), MapController::new(LogMapView));
            let outcome = app.lookup(client, &address).await;
            if outcome == LookupOutcome::Rendered {
                write_html_page(path, app.renderer()).with_context(|| format!("writing {}", path.display()))?;
                println!("Skrev {}", path.display());
            }
            report_alerts(app.renderer());
            outcome
        }
        None => {
            let renderer = TextRenderer::new(std::io::stdout());
            let mut app = AppController::new(renderer, MapController::new(LogMapView));
            app.lookup(client, &address).await
        }
    };

    match outcome {
        LookupOutcome::Failed(e) => Err(anyhow!(e).context("risk lookup failed")),
        _ => Ok(()),
    }
}

fn report_alerts(renderer: &HtmlRenderer) {
    for msg in &renderer.alerts_raised {
        eprintln!("{}", msg);
    }
}

/// Lists base layers and overlays, with a GetMap URL for a small box around
/// the given point (or the default map center).
fn cmd_layers(args: &[String]) -> Result<()> {
    let (lat, lon) = match args {
        [] => (DEFAULT_CENTER.lat, DEFAULT_CENTER.lon),
        [lat, lon] => (
            lat.parse().with_context(|| format!("bad latitude '{}'", lat))?,
            lon.parse().with_context(|| format!("bad longitude '{}'", lon))?,
        ),
        _ => bail!(USAGE),
    };
    let bbox = BoundingBox {
        min_lat: lat - 0.01,
        min_lon: lon - 0.02,
        max_lat: lat + 0.01,
        max_lon: lon + 0.02,
    };

    for base in BASE_LAYERS {
        println!("{} (maks zoom {}, {})", base.url_template, base.max_zoom, base.attribution);
    }
    for source in OVERLAYS {
        let url = source.get_map_url(bbox, 256, 256)?;
        println!("{:<16} {} (opasitet {})\n  {}", source.id, source.label, source.opacity, url);
    }
    Ok(())
}

/// Prints the dropdown to stdout.
struct TerminalSearchView;

impl SearchView for TerminalSearchView {
    fn set_input_text(&mut self, text: &str) {
        println!("> {}", text);
    }

    fn show_results(&mut self, items: &[ResultItem]) {
        for (i, item) in items.iter().enumerate() {
            println!("  {:>2}. {}  ({})", i, item.title, item.subtitle.trim());
        }
    }

    fn hide_results(&mut self) {}

    fn highlight(&mut self, index: Option<usize>) {
        if let Some(i) = index {
            println!("  [{}]", i);
        }
    }
}

async fn cmd_interactive<C>(client: C, cfg: &Config) -> Result<()>
where
    C: RiskApi + Send + Sync + 'static,
{
    println!("Skriv en adresse. Kommandoer: :down :up :enter :esc :outside :pick N :overlay ID :quit");
    println!(
        "Kartlag: {}",
        OVERLAYS.iter().map(|o| o.id).collect::<Vec<_>>().join(", ")
    );

    let (select_tx, mut select_rx) = mpsc::unbounded_channel();
    let mut search = SearchController::new(TerminalSearchView, select_tx, cfg.debounce_ms, cfg.min_query_len);
    let mut app = AppController::new(TextRenderer::new(std::io::stdout()), MapController::new(LogMapView));

    let (ui_tx, ui_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Some(event) = parse_command(&line) else {
                eprintln!("ukjent kommando: {}", line.trim());
                continue;
            };
            let quit = event == UiEvent::Quit;
            if ui_tx.send(event).await.is_err() || quit {
                break;
            }
        }
    });

    run_session(Arc::new(client), &mut search, &mut select_rx, &mut app, ui_rx).await;
    logging::info(
        Domain::System,
        "shutdown",
        obj(&[("overlays", v_str(&app.map().enabled_overlays().join(",")))]),
    );
    Ok(())
}

/// Maps a line of stdin to a UI event; plain text is typed into the input.
fn parse_command(line: &str) -> Option<UiEvent> {
    let Some(cmd) = line.trim().strip_prefix(':') else {
        return Some(UiEvent::Input(line.to_string()));
    };
    let mut parts = cmd.split_whitespace();
    let event = match (parts.next()?, parts.next()) {
        ("down", None) => UiEvent::Key(Key::ArrowDown),
        ("up", None) => UiEvent::Key(Key::ArrowUp),
        ("enter", None) => UiEvent::Key(Key::Enter),
        ("esc", None) => UiEvent::Key(Key::Escape),
        ("outside", None) => UiEvent::ClickOutside,
        ("pick", Some(n)) => UiEvent::ClickResult(n.parse().ok()?),
        ("overlay", Some(id)) => UiEvent::ToggleOverlay(id.to_string()),
        ("quit", None) => UiEvent::Quit,
        _ => return None,
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("Storgata"), Some(UiEvent::Input("Storgata".to_string())));
        assert_eq!(parse_command(":down"), Some(UiEvent::Key(Key::ArrowDown)));
        assert_eq!(parse_command(" :pick 2"), Some(UiEvent::ClickResult(2)));
        assert_eq!(
            parse_command(":overlay flood"),
            Some(UiEvent::ToggleOverlay("flood".to_string()))
        );
        assert_eq!(parse_command(":pick x"), None);
        assert_eq!(parse_command(":dance"), None);
    }

    #[test]
    fn test_risk_opts() {
        let args: Vec<String> = ["--pick", "2", "--html", "out.html"].iter().map(|s| s.to_string()).collect();
        let opts = RiskOpts::parse(&args).unwrap();
        assert_eq!(opts.pick, 2);
        assert_eq!(opts.html, Some(PathBuf::from("out.html")));
        assert!(RiskOpts::parse(&["--bogus".to_string()]).is_err());
    }
}
