//! Composition root: selection → risk lookup → dashboard + map.
//!
//! [`AppController`] is the only layer that shows a user-facing error.
//! [`run_session`] drives search, lookups and UI events on a single task.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};

use crate::client::{ClientError, RiskApi};
use crate::dashboard::DashboardModel;
use crate::logging::{self, obj, v_int, v_num, v_str, Domain};
use crate::map::{MapController, MapView};
use crate::model::{Address, RiskAssessment};
use crate::render::Renderer;
use crate::search::{Key, SearchController, SearchView};

pub const RISK_FAILURE_MESSAGE: &str = "Kunne ikke hente risikovurdering. Prøv igjen senere.";

/// An issued risk lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskTicket {
    pub generation: u64,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Rendered,
    Failed(ClientError),
    /// A newer lookup was issued before this one finished.
    Stale,
}

pub struct AppController<R: Renderer, M: MapView> {
    renderer: R,
    map: MapController<M>,
    issued: u64,
}

impl<R: Renderer, M: MapView> AppController<R, M> {
    pub fn new(renderer: R, map: MapController<M>) -> Self {
        Self {
            renderer,
            map,
            issued: 0,
        }
    }

    /// Hides the dashboard, shows the loading state and issues a ticket.
    pub fn begin_lookup(&mut self, address: &Address) -> RiskTicket {
        self.issued += 1;
        self.renderer.set_visible(false);
        self.renderer.set_loading(true);
        logging::info(
            Domain::Risk,
            "risk.begin",
            obj(&[
                ("generation", v_int(self.issued)),
                ("text", v_str(&address.text)),
                ("lat", v_num(address.latitude)),
                ("lon", v_num(address.longitude)),
            ]),
        );
        RiskTicket {
            generation: self.issued,
            address: address.clone(),
        }
    }

    /// Applies the result of a lookup, unless a newer one has been issued.
    pub fn finish_lookup(&mut self, ticket: RiskTicket, result: Result<RiskAssessment, ClientError>) -> LookupOutcome {
        if ticket.generation != self.issued {
            logging::debug(
                Domain::Risk,
                "risk.stale",
                obj(&[("generation", v_int(ticket.generation)), ("latest", v_int(self.issued))]),
            );
            return LookupOutcome::Stale;
        }

        self.renderer.set_loading(false);
        match result {
            Ok(assessment) => {
                let model = DashboardModel::from_assessment(&assessment);
                self.renderer.render(&model);
                self.renderer.set_visible(true);
                self.map.set_location(
                    ticket.address.latitude,
                    ticket.address.longitude,
                    &assessment.historical_events,
                );
                logging::info(
                    Domain::Dashboard,
                    "dashboard.rendered",
                    obj(&[
                        ("generation", v_int(ticket.generation)),
                        ("score", v_num(model.banner.score)),
                        ("level", v_str(model.banner.level.as_str())),
                        ("cards", v_int(model.cards.len() as u64)),
                        ("alerts", v_int(model.alerts.len() as u64)),
                    ]),
                );
                LookupOutcome::Rendered
            }
            Err(e) => {
                logging::error(
                    Domain::Risk,
                    "risk.failed",
                    obj(&[("generation", v_int(ticket.generation)), ("error", v_str(&e.to_string()))]),
                );
                self.renderer.alert(RISK_FAILURE_MESSAGE);
                LookupOutcome::Failed(e)
            }
        }
    }

    /// Issues and awaits a single lookup.
    pub async fn lookup<C: RiskApi + ?Sized>(&mut self, client: &C, address: &Address) -> LookupOutcome {
        let ticket = self.begin_lookup(address);
        let result = client.risk_for(&ticket.address).await;
        self.finish_lookup(ticket, result)
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn map(&self) -> &MapController<M> {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapController<M> {
        &mut self.map
    }
}

/// User interaction fed into a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Input(String),
    Key(Key),
    ClickResult(usize),
    ClickOutside,
    ToggleOverlay(String),
    Quit,
}

type SearchFuture = BoxFuture<'static, (u64, Result<Vec<Address>, ClientError>)>;
type LookupFuture = BoxFuture<'static, (RiskTicket, Result<RiskAssessment, ClientError>)>;

/// Runs until `events` closes or yields [`UiEvent::Quit`].
///
/// Everything happens on the calling task. Requests are never cancelled once
/// sent; stale responses are discarded by generation.
pub async fn run_session<C, V, R, M>(
    client: Arc<C>,
    search: &mut SearchController<V>,
    selections: &mut mpsc::UnboundedReceiver<Address>,
    app: &mut AppController<R, M>,
    mut events: mpsc::Receiver<UiEvent>,
) where
    C: RiskApi + Send + Sync + 'static,
    V: SearchView,
    R: Renderer,
    M: MapView,
{
    let origin = Instant::now();
    let now_ms = || origin.elapsed().as_millis() as u64;
    let mut searches: FuturesUnordered<SearchFuture> = FuturesUnordered::new();
    let mut lookups: FuturesUnordered<LookupFuture> = FuturesUnordered::new();

    logging::info(Domain::System, "session.start", obj(&[]));

    loop {
        let deadline = search.next_deadline();
        let wake = deadline
            .map(|ms| origin + Duration::from_millis(ms))
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            ev = events.recv() => match ev {
                None | Some(UiEvent::Quit) => break,
                Some(UiEvent::Input(text)) => search.on_input(now_ms(), &text),
                Some(UiEvent::Key(key)) => {
                    search.on_key(key);
                }
                Some(UiEvent::ClickResult(index)) => {
                    search.select(index);
                }
                Some(UiEvent::ClickOutside) => search.on_click_outside(),
                Some(UiEvent::ToggleOverlay(id)) => {
                    if let Err(e) = app.map_mut().toggle_overlay(&id) {
                        logging::warn(Domain::Map, "map.overlay_rejected", obj(&[("error", v_str(&e.to_string()))]));
                    }
                }
            },
            _ = sleep_until(wake), if deadline.is_some() => {
                if let Some(req) = search.poll(now_ms()) {
                    let client = client.clone();
                    searches.push(
                        async move {
                            let result = client.search(&req.query).await;
                            (req.generation, result)
                        }
                        .boxed(),
                    );
                }
            }
            Some((generation, result)) = searches.next(), if !searches.is_empty() => {
                search.on_results(generation, result);
            }
            Some(address) = selections.recv() => {
                let ticket = app.begin_lookup(&address);
                let client = client.clone();
                lookups.push(
                    async move {
                        let result = client.risk_for(&ticket.address).await;
                        (ticket, result)
                    }
                    .boxed(),
                );
            }
            Some((ticket, result)) = lookups.next(), if !lookups.is_empty() => {
                app.finish_lookup(ticket, result);
            }
        }
    }

    logging::info(
        Domain::System,
        "session.end",
        obj(&[
            ("searches_in_flight", v_int(searches.len() as u64)),
            ("lookups_in_flight", v_int(lookups.len() as u64)),
        ]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{EventMarker, LatLon, OverlaySource};
    use crate::render::HtmlRenderer;
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Default)]
    struct NullMap;

    impl MapView for NullMap {
        fn set_base_view(&mut self, _center: LatLon, _zoom: u8) {}
        fn place_location_marker(&mut self, _at: LatLon) {}
        fn remove_location_marker(&mut self) {}
        fn set_event_markers(&mut self, _markers: &[EventMarker]) {}
        fn set_overlay_enabled(&mut self, _overlay: &OverlaySource, _enabled: bool) {}
    }

    struct FixedApi(Result<RiskAssessment, ClientError>);

    #[async_trait]
    impl RiskApi for FixedApi {
        async fn search(&self, _query: &str) -> Result<Vec<Address>, ClientError> {
            Ok(Vec::new())
        }
        async fn risk_for(&self, _address: &Address) -> Result<RiskAssessment, ClientError> {
            self.0.clone()
        }
    }

    fn address() -> Address {
        Address {
            text: "Storgata 1".to_string(),
            latitude: 59.9,
            longitude: 10.7,
            kommunenummer: "0301".to_string(),
            kommunenavn: None,
            postnummer: None,
            poststed: None,
        }
    }

    fn app() -> AppController<HtmlRenderer, NullMap> {
        AppController::new(HtmlRenderer::new(), MapController::new(NullMap))
    }

    #[test]
    fn test_begin_lookup_hides_and_loads() {
        let mut app = app();
        app.renderer.visible = true;
        let ticket = app.begin_lookup(&address());
        assert_eq!(ticket.generation, 1);
        assert!(!app.renderer().visible);
        assert!(app.renderer().loading);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut app = app();
        let first = app.begin_lookup(&address());
        let second = app.begin_lookup(&address());

        let ok = RiskAssessment {
            overall_score: json!(10),
            ..Default::default()
        };
        assert_eq!(app.finish_lookup(first, Ok(ok.clone())), LookupOutcome::Stale);
        assert!(app.renderer().loading);
        assert!(app.map().location().is_none());

        assert_eq!(app.finish_lookup(second, Ok(ok)), LookupOutcome::Rendered);
        assert!(!app.renderer().loading);
        assert!(app.renderer().visible);
        assert_eq!(app.map().location(), Some(LatLon { lat: 59.9, lon: 10.7 }));
    }

    #[tokio::test]
    async fn test_failure_alerts_and_keeps_dashboard_hidden() {
        let mut app = app();
        let api = FixedApi(Err(ClientError::Http { status: 500 }));
        let outcome = app.lookup(&api, &address()).await;
        assert_eq!(outcome, LookupOutcome::Failed(ClientError::Http { status: 500 }));
        assert!(!app.renderer().loading);
        assert!(!app.renderer().visible);
        assert_eq!(app.renderer().alerts_raised, vec![RISK_FAILURE_MESSAGE.to_string()]);
    }
}
