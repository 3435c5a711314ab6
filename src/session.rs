//! One open document wired to selection and placement
//!
//! A [`Session`] owns the render service, the view state, the current text
//! layer and the selection tracker. The raster and its text layer are always
//! replaced together: a page or zoom change drops both before anything new
//! is rendered, so no fragment from an older viewport is ever hit-tested
//! against a newer raster.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::pdf::{
    Command, Effect, NativeRange, PdfBackend, RenderError, RenderResponse, RenderService,
    RenderedPage, RequestId, Selection, SelectionTracker, TextLayer, TextLayerBuilder, ViewState,
};
use crate::placement::{PlacementDispatcher, PlacementError, PlacementTarget};
use crate::settings::Settings;
use crate::source::{OpenError, SourceKind};
use crate::store::{SheetId, TextBox, TextBoxStore};
use crate::zones::{TemplateRegistry, Zone};

type SelectionCallback = Box<dyn FnMut(&Selection)>;

pub struct Session<S: TextBoxStore> {
    service: RenderService,
    view: ViewState,
    builder: TextLayerBuilder,
    page: Option<Arc<RenderedPage>>,
    layer: Option<Arc<TextLayer>>,
    pending: Option<RequestId>,
    tracker: SelectionTracker,
    last_selection: Option<Selection>,
    on_selection_ready: Option<SelectionCallback>,
    dispatcher: PlacementDispatcher,
    store: S,
    sheet_id: SheetId,
    template: Option<String>,
}

impl<S: TextBoxStore> Session<S> {
    /// Open an upload. The file kind is sniffed first; anything that is not
    /// a PDF or a supported image is rejected before a backend sees it.
    pub fn open(
        bytes: impl Into<Arc<[u8]>>,
        pdf: Arc<dyn PdfBackend>,
        settings: &Settings,
        store: S,
        sheet_id: SheetId,
    ) -> Result<Self, OpenError> {
        let bytes = bytes.into();
        let kind = SourceKind::detect(&bytes)?;
        info!("Opening {kind:?} upload ({} bytes)", bytes.len());
        Self::with_backend(kind.backend(pdf), bytes, settings, store, sheet_id)
    }

    /// Open `bytes` with an explicit backend, skipping type detection
    pub fn with_backend(
        backend: Arc<dyn PdfBackend>,
        bytes: impl Into<Arc<[u8]>>,
        settings: &Settings,
        store: S,
        sheet_id: SheetId,
    ) -> Result<Self, OpenError> {
        let service = RenderService::open(backend, bytes.into(), settings.render_config())?;
        let view = ViewState::new(
            service.page_count(),
            settings.default_scale,
            settings.min_scale,
            settings.max_scale,
        );
        let dispatcher = PlacementDispatcher::new(
            TemplateRegistry::with_custom(&settings.templates),
            settings.layout,
            settings.canvas,
            settings.box_defaults(),
        );

        Ok(Self {
            service,
            view,
            builder: TextLayerBuilder::new(settings.granularity),
            page: None,
            layer: None,
            pending: None,
            tracker: SelectionTracker::new(settings.selection_config()),
            last_selection: None,
            on_selection_ready: None,
            dispatcher,
            store,
            sheet_id,
            template: None,
        })
    }

    /// Register the callback fired once per completed, non-empty selection
    pub fn set_on_selection_ready(&mut self, callback: impl FnMut(&Selection) + 'static) {
        self.on_selection_ready = Some(Box::new(callback));
    }

    pub fn set_template(&mut self, template: Option<&str>) {
        self.template = template.map(str::to_string);
    }

    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn set_sheet(&mut self, sheet_id: SheetId) {
        self.sheet_id = sheet_id;
    }

    #[must_use]
    pub fn sheet_id(&self) -> SheetId {
        self.sheet_id
    }

    #[must_use]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.view.page_count
    }

    /// Raster of the displayed page, if it rendered successfully
    #[must_use]
    pub fn page(&self) -> Option<&Arc<RenderedPage>> {
        self.page.as_ref()
    }

    #[must_use]
    pub fn text_layer(&self) -> Option<&Arc<TextLayer>> {
        self.layer.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Selection waiting to be placed
    #[must_use]
    pub fn last_selection(&self) -> Option<&Selection> {
        self.last_selection.as_ref()
    }

    /// Zones of the active template; empty for a freeform canvas
    #[must_use]
    pub fn zone_choices(&self) -> &[Zone] {
        self.dispatcher.registry().zones_for(self.template.as_deref())
    }

    /// Render the current page and rebuild its text layer, blocking for at
    /// most the render timeout. On failure nothing is displayed.
    pub fn show_current_page(&mut self) -> Result<Arc<TextLayer>, RenderError> {
        self.discard_page();
        let rendered = self.service.render(self.view.current_page, self.view.scale)?;
        Ok(self.install(rendered))
    }

    /// Queue a render of the current page without blocking; pick the result
    /// up with [`Session::poll_render`]
    pub fn request_current_page(&mut self) -> RequestId {
        self.discard_page();
        let id = self
            .service
            .request_page(self.view.current_page, self.view.scale);
        self.pending = Some(id);
        id
    }

    /// Install a finished render for the current view, if one arrived.
    ///
    /// Results for a page or scale that is no longer current are dropped.
    pub fn poll_render(&mut self) -> Option<Result<Arc<TextLayer>, RenderError>> {
        let mut outcome = None;
        for response in self.service.poll_responses() {
            if Some(response.id()) != self.pending {
                continue;
            }
            self.pending = None;
            match response {
                RenderResponse::Page { data, .. } => {
                    if data.viewport.matches(self.view.current_page, self.view.scale) {
                        outcome = Some(Ok(self.install(data)));
                    } else {
                        debug!("Dropping render for outdated viewport {:?}", data.viewport);
                    }
                }
                RenderResponse::Error { error, .. } => outcome = Some(Err(error)),
                RenderResponse::Cancelled(_) => {}
            }
        }
        outcome
    }

    /// Switch pages; the text layer and any in-flight gesture are dropped
    pub fn on_page_change(&mut self, page: usize) -> Result<(), RenderError> {
        let effects = self.view.apply(Command::GoToPage(page));
        self.execute(effects)
    }

    /// Change zoom; the text layer and any in-flight gesture are dropped
    pub fn on_zoom_change(&mut self, scale: f32) -> Result<(), RenderError> {
        let effects = self.view.apply(Command::SetScale(scale));
        self.execute(effects)
    }

    /// Move to `page` and, if given, `scale`, rendering the result once
    pub fn on_view_change(&mut self, page: usize, scale: Option<f32>) -> Result<(), RenderError> {
        let mut effects = self.view.apply(Command::GoToPage(page));
        if let Some(scale) = scale {
            for effect in self.view.apply(Command::SetScale(scale)) {
                if !effects.contains(&effect) {
                    effects.push(effect);
                }
            }
        }
        if effects.is_empty() && self.layer.is_none() {
            effects = self.view.apply(Command::Redisplay);
        }
        self.execute(effects)
    }

    /// Drop every cached raster and render the current page again
    pub fn redisplay(&mut self) -> Result<(), RenderError> {
        self.service.invalidate_cache();
        let effects = self.view.apply(Command::Redisplay);
        self.execute(effects)
    }

    fn execute(&mut self, effects: Vec<Effect>) -> Result<(), RenderError> {
        let mut result = Ok(());
        for effect in effects {
            match effect {
                Effect::CancelSelection => self.tracker.cancel(),
                Effect::DiscardTextLayer => self.discard_page(),
                Effect::RenderCurrentPage => {
                    if let Some(id) = self.pending.take() {
                        self.service.cancel(id);
                    }
                    if let Err(e) = self.show_current_page() {
                        result = Err(e);
                    }
                }
                Effect::UpdatePrefetch => self
                    .service
                    .schedule_prefetch(self.view.current_page, self.view.scale),
            }
        }
        result
    }

    /// A selection never outlives the layer it was made on
    fn discard_page(&mut self) {
        self.page = None;
        self.layer = None;
        self.last_selection = None;
    }

    fn install(&mut self, rendered: Arc<RenderedPage>) -> Arc<TextLayer> {
        let layer = Arc::new(self.builder.build(&rendered.runs, &rendered.viewport));
        self.page = Some(rendered);
        self.layer = Some(Arc::clone(&layer));
        layer
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.last_selection = None;
        match &self.layer {
            Some(layer) => self.tracker.pointer_down(layer, x, y),
            None => self.tracker.cancel(),
        }
    }

    /// Fragment indices to highlight for the in-flight drag
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Vec<usize> {
        match &self.layer {
            Some(layer) => self.tracker.pointer_move(layer, x, y),
            None => Vec::new(),
        }
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) -> Option<Selection> {
        let selection = match &self.layer {
            Some(layer) => self.tracker.pointer_up(layer, x, y),
            None => {
                self.tracker.cancel();
                None
            }
        }?;
        self.selection_ready(&selection);
        Some(selection)
    }

    /// Resolve a host-reported selection range on the current layer
    pub fn select_native(&mut self, range: NativeRange) -> Option<Selection> {
        self.last_selection = None;
        let selection = self.tracker.select_native(self.layer.as_ref()?, range)?;
        self.selection_ready(&selection);
        Some(selection)
    }

    fn selection_ready(&mut self, selection: &Selection) {
        self.last_selection = Some(selection.clone());
        if let Some(callback) = self.on_selection_ready.as_mut() {
            callback(selection);
        }
    }

    /// Create one text box from `text` on the current sheet
    pub fn on_request_placement(
        &mut self,
        text: &str,
        target: &PlacementTarget,
    ) -> Result<TextBox, PlacementError> {
        self.dispatcher.place(
            &mut self.store,
            self.sheet_id,
            self.template.as_deref(),
            text,
            target,
        )
    }

    /// Place the last completed selection.
    ///
    /// The selection is only consumed once the box exists, so a failed
    /// placement can be retried. `Ok(None)` when there is nothing to place.
    pub fn place_selection(
        &mut self,
        target: &PlacementTarget,
    ) -> Result<Option<TextBox>, PlacementError> {
        let Some(text) = self.last_selection.as_ref().map(|s| s.text.clone()) else {
            return Ok(None);
        };
        match self.on_request_placement(&text, target) {
            Ok(created) => {
                self.last_selection = None;
                Ok(Some(created))
            }
            Err(e) => {
                warn!("Placement failed, keeping selection for retry: {e}");
                Err(e)
            }
        }
    }
}
