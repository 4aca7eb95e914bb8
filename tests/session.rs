//! Session tests on a paused clock: debounce timing, selection flow and
//! out-of-order responses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

use riskdash::app::{run_session, AppController, UiEvent};
use riskdash::client::{ClientError, RiskApi};
use riskdash::map::{EventMarker, LatLon, MapController, MapView, OverlaySource};
use riskdash::model::{Address, Hazard, RiskAssessment};
use riskdash::render::HtmlRenderer;
use riskdash::search::{Key, ResultItem, SearchController, SearchView};

struct FakeApi {
    origin: Instant,
    searches: Mutex<Vec<(String, u64)>>,
    lookups: Mutex<Vec<String>>,
    search_delay_ms: HashMap<String, u64>,
    risk_delay_ms: HashMap<String, u64>,
}

impl FakeApi {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            searches: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            search_delay_ms: HashMap::new(),
            risk_delay_ms: HashMap::new(),
        }
    }

    fn searches(&self) -> Vec<(String, u64)> {
        self.searches.lock().unwrap().clone()
    }

    fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

fn address(text: &str, lat: f64) -> Address {
    Address {
        text: text.to_string(),
        latitude: lat,
        longitude: 10.7,
        kommunenummer: "0301".to_string(),
        kommunenavn: Some("Oslo".to_string()),
        postnummer: Some("0155".to_string()),
        poststed: Some("OSLO".to_string()),
    }
}

#[async_trait]
impl RiskApi for FakeApi {
    async fn search(&self, query: &str) -> Result<Vec<Address>, ClientError> {
        let at = self.origin.elapsed().as_millis() as u64;
        self.searches.lock().unwrap().push((query.to_string(), at));
        if let Some(ms) = self.search_delay_ms.get(query) {
            sleep(Duration::from_millis(*ms)).await;
        }
        Ok(vec![
            address(&format!("{} 1", query), 59.91),
            address(&format!("{} 2", query), 59.92),
        ])
    }

    async fn risk_for(&self, address: &Address) -> Result<RiskAssessment, ClientError> {
        self.lookups.lock().unwrap().push(address.text.clone());
        if let Some(ms) = self.risk_delay_ms.get(&address.text) {
            sleep(Duration::from_millis(*ms)).await;
        }
        Ok(RiskAssessment {
            overall_score: json!(72),
            overall_level: Some("high".to_string()),
            summary: Some(format!("Vurdering for {}", address.text)),
            address: Some(address.clone()),
            hazards: vec![
                Hazard {
                    id: "quake".to_string(),
                    name: Some("Jordskjelv".to_string()),
                    error: Some("no data".to_string()),
                    ..Default::default()
                },
                Hazard {
                    id: "flood".to_string(),
                    name: Some("Flom".to_string()),
                    score: json!(72),
                    level: Some("high".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        })
    }
}

#[derive(Debug, Default)]
struct ListView {
    input: String,
    items: Vec<ResultItem>,
}

impl SearchView for ListView {
    fn set_input_text(&mut self, text: &str) {
        self.input = text.to_string();
    }
    fn show_results(&mut self, items: &[ResultItem]) {
        self.items = items.to_vec();
    }
    fn hide_results(&mut self) {
        self.items.clear();
    }
    fn highlight(&mut self, _index: Option<usize>) {}
}

#[derive(Debug, Default)]
struct RecordingMap {
    markers: Vec<LatLon>,
    events: usize,
    overlays: Vec<String>,
}

impl MapView for RecordingMap {
    fn set_base_view(&mut self, _center: LatLon, _zoom: u8) {}
    fn place_location_marker(&mut self, at: LatLon) {
        self.markers.push(at);
    }
    fn remove_location_marker(&mut self) {
        self.markers.pop();
    }
    fn set_event_markers(&mut self, markers: &[EventMarker]) {
        self.events = markers.len();
    }
    fn set_overlay_enabled(&mut self, overlay: &OverlaySource, enabled: bool) {
        self.overlays.retain(|id| id != overlay.id);
        if enabled {
            self.overlays.push(overlay.id.to_string());
        }
    }
}

struct Harness {
    search: SearchController<ListView>,
    selections: mpsc::UnboundedReceiver<Address>,
    app: AppController<HtmlRenderer, RecordingMap>,
}

impl Harness {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            search: SearchController::new(ListView::default(), tx, 250, 2),
            selections: rx,
            app: AppController::new(HtmlRenderer::new(), MapController::new(RecordingMap::default())),
        }
    }

    /// Feeds `script` as (delay before, event) pairs, then quits.
    async fn run(&mut self, api: Arc<FakeApi>, script: Vec<(u64, UiEvent)>) {
        let (ui_tx, ui_rx) = mpsc::channel(16);
        let driver = async move {
            for (delay, ev) in script {
                sleep(Duration::from_millis(delay)).await;
                ui_tx.send(ev).await.unwrap();
            }
            sleep(Duration::from_millis(5_000)).await;
            ui_tx.send(UiEvent::Quit).await.unwrap();
        };
        tokio::join!(
            run_session(api, &mut self.search, &mut self.selections, &mut self.app, ui_rx),
            driver
        );
    }
}

fn input(s: &str) -> UiEvent {
    UiEvent::Input(s.to_string())
}

#[tokio::test(start_paused = true)]
async fn burst_collapses_into_one_search() {
    let api = Arc::new(FakeApi::new());
    let mut h = Harness::new();
    h.run(
        api.clone(),
        vec![(0, input("St")), (50, input("Sto")), (50, input("Stor")), (100, input("Storg"))],
    )
    .await;

    let searches = api.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].0, "Storg");
    assert!(searches[0].1 >= 450, "dispatched at {}ms", searches[0].1);
}

#[tokio::test(start_paused = true)]
async fn single_keystroke_dispatches_after_quiet_period() {
    let api = Arc::new(FakeApi::new());
    let mut h = Harness::new();
    h.run(api.clone(), vec![(0, input("Bergen"))]).await;

    let searches = api.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].0, "Bergen");
    assert!(searches[0].1 >= 250);
}

#[tokio::test(start_paused = true)]
async fn short_input_never_searches() {
    let api = Arc::new(FakeApi::new());
    let mut h = Harness::new();
    h.run(api.clone(), vec![(0, input("S")), (10, input(" "))]).await;
    assert!(api.searches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn keyboard_selection_renders_dashboard_and_map() {
    let api = Arc::new(FakeApi::new());
    let mut h = Harness::new();
    h.run(
        api.clone(),
        vec![
            (0, input("Storgata")),
            (400, UiEvent::Key(Key::ArrowDown)),
            (10, UiEvent::Key(Key::ArrowDown)),
            (10, UiEvent::Key(Key::Enter)),
            (10, UiEvent::ToggleOverlay("flood".to_string())),
        ],
    )
    .await;

    assert_eq!(api.lookups(), vec!["Storgata 2".to_string()]);
    assert_eq!(h.search.view().input, "Storgata 2");
    assert!(h.search.view().items.is_empty());

    let r = h.app.renderer();
    assert!(r.visible);
    assert!(!r.loading);
    assert!(r.alerts_raised.is_empty());
    let flood = r.cards_html.find("data-hazard=\"flood\"").unwrap();
    let quake = r.cards_html.find("data-hazard=\"quake\"").unwrap();
    assert!(flood < quake);

    let map = h.app.map();
    assert_eq!(map.location(), Some(LatLon { lat: 59.92, lon: 10.7 }));
    assert_eq!(map.view().markers.len(), 1);
    assert_eq!(map.view().overlays, vec!["flood".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn slow_search_response_is_discarded() {
    let mut api = FakeApi::new();
    api.search_delay_ms.insert("Storgata".to_string(), 1_000);
    api.search_delay_ms.insert("Storgata 9".to_string(), 10);
    let api = Arc::new(api);

    let mut h = Harness::new();
    h.run(api.clone(), vec![(0, input("Storgata")), (300, input("Storgata 9"))]).await;

    assert_eq!(api.searches().len(), 2);
    let shown: Vec<String> = h.search.view().items.iter().map(|i| i.title.clone()).collect();
    assert_eq!(shown, vec!["Storgata 9 1".to_string(), "Storgata 9 2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn slow_risk_response_is_discarded() {
    let mut api = FakeApi::new();
    api.risk_delay_ms.insert("Storgata 1".to_string(), 2_000);
    api.risk_delay_ms.insert("Storgata 2".to_string(), 10);
    let api = Arc::new(api);

    let mut h = Harness::new();
    h.run(
        api.clone(),
        vec![
            (0, input("Storgata")),
            (400, UiEvent::ClickResult(0)),
            (10, input("Storgata")),
            (400, UiEvent::ClickResult(1)),
        ],
    )
    .await;

    assert_eq!(api.lookups(), vec!["Storgata 1".to_string(), "Storgata 2".to_string()]);
    assert!(h.app.renderer().banner_html.contains("Vurdering for Storgata 2"));
    assert_eq!(h.app.map().location(), Some(LatLon { lat: 59.92, lon: 10.7 }));
    assert_eq!(h.app.map().view().markers, vec![LatLon { lat: 59.92, lon: 10.7 }]);
}
