//! Gallery state for PhotoJournal: query, masonry layout, selection and the
//! detail navigator, driven through [`Gallery::update`].

pub mod masonry;
pub mod navigator;
pub mod query;
pub mod selection;

pub use masonry::{assign_columns, layout, HeightCache, LayoutAssignment, LayoutConfig, LayoutError};
pub use navigator::{classify_swipe, ChromeEvent, ChromeNotifier, DetailNavigator, SwipeAction, DEFAULT_SWIPE_THRESHOLD};
pub use query::{
    breakdown, breakdown_at, evaluate, evaluate_at, format_capture_date, result_summary, Breakdown,
    DateFilter, QuerySpec, SortDirection, SortKey,
};
pub use selection::{SelectionState, TapOutcome};

use chrono::{DateTime, FixedOffset, Local};
use lookup_client::PhotoRecord;
use photo_store::{DeleteReport, PhotoStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Store Error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Layout Error: {0}")]
    LayoutError(#[from] LayoutError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    SearchChanged(String),
    DateFilterChanged(DateFilter),
    SortKeyChanged(SortKey),
    ToggleSortDirection,
    LongPress(String),
    Tap(String),
    BackgroundTap,
    ExitSelection,
    ConfirmDelete,
    NavigateAway,
    OpenDetail(String),
    CloseDetail,
    NextPhoto,
    PreviousPhoto,
    Swipe { start_x: f32, end_x: f32 },
    ImageMeasured { id: String, width: u32, height: u32 },
    ViewportResized(f32),
    PhotoCaptured(PhotoRecord),
}

/// What a message did beyond changing gallery state.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    DetailOpened(String),
    Deleted(DeleteReport),
    Created(String),
}

/// Owns the photo store and every view derived from it.
///
/// The visible list and the layout are recomputed before `update` returns,
/// so readers never observe a stale view.
pub struct Gallery {
    store: PhotoStore,
    query: QuerySpec,
    selection: SelectionState,
    heights: HeightCache,
    config: LayoutConfig,
    swipe_threshold: f32,
    navigator: Option<DetailNavigator>,
    chrome: Option<ChromeNotifier>,
    clock: Option<DateTime<FixedOffset>>,
    visible: Vec<PhotoRecord>,
    layout: LayoutAssignment,
}

impl Gallery {
    pub fn new(store: PhotoStore, config: LayoutConfig) -> Result<Self, GalleryError> {
        config.validate()?;
        let mut gallery = Gallery {
            store,
            query: QuerySpec::default(),
            selection: SelectionState::default(),
            heights: HeightCache::new(),
            config,
            swipe_threshold: DEFAULT_SWIPE_THRESHOLD,
            navigator: None,
            chrome: None,
            clock: None,
            visible: Vec::new(),
            layout: LayoutAssignment::default(),
        };
        gallery.refresh()?;
        Ok(gallery)
    }

    pub fn with_chrome(mut self, notifier: ChromeNotifier) -> Self {
        self.chrome = Some(notifier);
        self
    }

    pub fn with_swipe_threshold(mut self, threshold: f32) -> Self {
        self.swipe_threshold = threshold;
        self
    }

    /// Pins "now" for date filters and counters.
    pub fn with_clock(mut self, now: DateTime<FixedOffset>) -> Result<Self, GalleryError> {
        self.clock = Some(now);
        self.refresh()?;
        Ok(self)
    }

    pub fn with_query(mut self, query: QuerySpec) -> Result<Self, GalleryError> {
        self.query = query;
        self.refresh()?;
        Ok(self)
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.clock.unwrap_or_else(|| Local::now().fixed_offset())
    }

    pub fn store(&self) -> &PhotoStore {
        &self.store
    }

    pub fn into_store(self) -> PhotoStore {
        self.store
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn visible(&self) -> &[PhotoRecord] {
        &self.visible
    }

    pub fn layout(&self) -> &LayoutAssignment {
        &self.layout
    }

    pub fn heights(&self) -> &HeightCache {
        &self.heights
    }

    pub fn navigator(&self) -> Option<&DetailNavigator> {
        self.navigator.as_ref()
    }

    pub fn is_detail_open(&self) -> bool {
        self.navigator.is_some()
    }

    pub fn breakdown(&self) -> Breakdown {
        breakdown_at(self.store.all(), &self.now())
    }

    pub fn summary(&self) -> Option<String> {
        result_summary(&self.query, self.visible.len(), self.store.len())
    }

    /// Records for the map view. Ignores the current query.
    pub fn geotagged(&self) -> Vec<&PhotoRecord> {
        self.store.geotagged()
    }

    pub async fn persist(&mut self) -> Result<(), GalleryError> {
        self.store.persist_async().await?;
        Ok(())
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub fn update(&mut self, message: Message) -> Result<Effect, GalleryError> {
        let effect = match message {
            Message::SearchChanged(term) => {
                self.query.search_term = term;
                self.refresh()?;
                Effect::None
            }
            Message::DateFilterChanged(filter) => {
                self.query.date_filter = filter;
                self.refresh()?;
                Effect::None
            }
            Message::SortKeyChanged(key) => {
                self.query.sort_key = key;
                self.refresh()?;
                Effect::None
            }
            Message::ToggleSortDirection => {
                self.query.sort_direction = self.query.sort_direction.toggled();
                self.refresh()?;
                Effect::None
            }
            Message::LongPress(id) => {
                self.selection.long_press(&id);
                Effect::None
            }
            Message::Tap(id) => match self.selection.tap(&id) {
                TapOutcome::OpenDetail(id) => self.open_detail(&id),
                TapOutcome::Toggled { .. } => Effect::None,
            },
            Message::BackgroundTap | Message::ExitSelection => {
                self.selection.exit();
                Effect::None
            }
            Message::ConfirmDelete => {
                let report = self.selection.confirm_delete(&mut self.store);
                if !report.deleted.is_empty() {
                    self.refresh()?;
                }
                Effect::Deleted(report)
            }
            Message::NavigateAway => {
                self.selection.navigate_away();
                self.close_detail();
                Effect::None
            }
            Message::OpenDetail(id) => self.open_detail(&id),
            Message::CloseDetail => {
                self.close_detail();
                Effect::None
            }
            Message::NextPhoto => {
                if let Some(nav) = self.navigator.as_mut() {
                    nav.next();
                }
                Effect::None
            }
            Message::PreviousPhoto => {
                if let Some(nav) = self.navigator.as_mut() {
                    nav.previous();
                }
                Effect::None
            }
            Message::Swipe { start_x, end_x } => {
                if let Some(nav) = self.navigator.as_mut() {
                    nav.swipe(start_x, end_x);
                }
                Effect::None
            }
            Message::ImageMeasured { id, width, height } => {
                if !self.store.contains(&id) {
                    tracing::debug!(id, "measurement for unknown photo ignored");
                } else if self.heights.record_measurement(&id, width, height) {
                    self.relayout()?;
                }
                Effect::None
            }
            Message::ViewportResized(width) => {
                self.config.viewport_width = width;
                self.relayout()?;
                Effect::None
            }
            Message::PhotoCaptured(record) => {
                let id = record.id.clone();
                self.store.create(record)?;
                self.refresh()?;
                Effect::Created(id)
            }
        };
        Ok(effect)
    }

    fn open_detail(&mut self, id: &str) -> Effect {
        match DetailNavigator::open(self.visible.clone(), id) {
            Some(nav) => {
                self.navigator = Some(nav.with_swipe_threshold(self.swipe_threshold));
                self.notify_chrome(ChromeEvent::Hide);
                tracing::debug!(id, "detail opened");
                Effect::DetailOpened(id.to_string())
            }
            None => {
                tracing::debug!(id, "not in the visible list, detail stays closed");
                Effect::None
            }
        }
    }

    fn close_detail(&mut self) {
        if self.navigator.take().is_some() {
            self.notify_chrome(ChromeEvent::Show);
        }
    }

    fn notify_chrome(&self, event: ChromeEvent) {
        if let Some(chrome) = &self.chrome {
            chrome.notify(event);
        }
    }

    fn relayout(&mut self) -> Result<(), GalleryError> {
        self.layout = layout(&self.visible, &self.config, &self.heights)?;
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), GalleryError> {
        self.visible = evaluate_at(self.store.all(), &self.query, &self.now());
        self.selection.prune(&self.store);
        let store = &self.store;
        self.heights.retain(|id| store.contains(id));
        if let Some(nav) = self.navigator.take() {
            self.navigator = nav.refresh(self.visible.clone());
            if self.navigator.is_none() {
                self.notify_chrome(ChromeEvent::Show);
            }
        }
        self.relayout()?;
        tracing::debug!(
            visible = self.visible.len(),
            total = self.store.len(),
            "gallery refreshed"
        );
        Ok(())
    }
}
