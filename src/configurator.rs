//! Step tracking for a multi-step product configurator
//!
//! The host forwards the configurator's lifecycle signals (step loaded, price
//! calculated, added to basket, ...) to a [`ConfiguratorTracker`], which turns them
//! into data layer events. The schemas for each event come from the host through
//! [`ConfiguratorSchemas`]. Identical consecutive events are pushed only once.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::DomNode;
use crate::ecommerce::{DataLayer, EcommerceTracker};
use crate::error::{ExtractError, Result};
use crate::extractors::Schema;
use crate::settings::Settings;

/// Query parameter carrying the configurator location, e.g. `confloc=3-1`
const LOCATION_PARAM: &str = "confloc";

/// Schemas for the configurator events, built per call from the current state
pub trait ConfiguratorSchemas {
    fn virtual_pageview(&self, step: u32) -> Schema;

    fn step_complete(&self, step: u32) -> Schema;

    fn summary(&self) -> Schema;

    fn add_to_basket(&self, step: u32) -> Schema;

    fn path_changed(&self, from_step: u32, to_step: u32) -> Schema;

    /// Schema for a choice made on `chosen`, or on an unknown element when the
    /// event waited for the price. `None` disables choice events.
    fn choice_made<N: DomNode>(&self, _step: u32, _chosen: Option<&N>) -> Option<Schema> {
        None
    }

    /// Schema for the information icon `element`; `None` disables instruction events
    fn instruction<N: DomNode>(
        &self,
        _step: u32,
        _configurator_type: &str,
        _element: &N,
    ) -> Option<Schema> {
        None
    }

    /// Schemas for the validation errors shown after pressing "next"
    fn errors(&self, _step: u32, _configurator_type: &str) -> Vec<Schema> {
        Vec::new()
    }
}

/// Data layer event names. `{currentStep}`, `{stepName}` and `{configuratorType}`
/// are substituted where they appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventNames {
    pub error_message: String,
    pub next_step: String,
    pub previous_step: String,
    pub summary: String,
    pub added_to_basket: String,
    pub virtual_pageview: String,
    pub step_complete: String,
    pub information_icon: String,
    pub choices_made: String,
}

impl Default for EventNames {
    fn default() -> Self {
        Self {
            error_message: "ErrorMessage".to_string(),
            next_step: "Volgende stap".to_string(),
            previous_step: "Vorige stap".to_string(),
            summary: "Samenvatting".to_string(),
            added_to_basket: "add_to_cart".to_string(),
            virtual_pageview: "VirtualPageview".to_string(),
            step_complete: "Stap {currentStep} afgerond - {stepName}".to_string(),
            information_icon: "Informatie icoon".to_string(),
            choices_made: "Keuzes stap {currentStep} - {configuratorType}".to_string(),
        }
    }
}

/// Session state of one configurator on a page
#[derive(Debug)]
pub struct ConfiguratorTracker<S> {
    configurator_type: String,
    schemas: S,
    event_names: EventNames,
    tracker: EcommerceTracker,
    current_step: u32,
    last_event: Option<String>,
    choice_pending: bool,
}

impl<S: ConfiguratorSchemas> ConfiguratorTracker<S> {
    pub fn new(configurator_type: impl Into<String>, schemas: S, settings: Settings) -> Self {
        Self {
            configurator_type: configurator_type.into(),
            schemas,
            event_names: EventNames::default(),
            tracker: EcommerceTracker::new(settings),
            current_step: 1,
            last_event: None,
            choice_pending: false,
        }
    }

    pub fn with_event_names(mut self, event_names: EventNames) -> Self {
        self.event_names = event_names;
        self
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn data_layer(&self) -> &DataLayer {
        self.tracker.data_layer()
    }

    /// Push the virtual pageview of the first step
    pub fn start<N: DomNode>(&mut self, root: &N) -> Result<()> {
        self.push_virtual_pageview(root, self.current_step)
    }

    /// The configurator loaded another step; `location` is the page URL
    pub fn step_loaded<N: DomNode>(&mut self, root: &N, location: &str) -> Result<()> {
        let step = step_from_location(location)?;
        self.push_virtual_pageview(root, step)?;
        self.push_path_changed(root, step)
    }

    /// The user moved on to the next main step
    pub fn next_main_step<N: DomNode>(
        &mut self,
        root: &N,
        location: &str,
        step_name: &str,
    ) -> Result<()> {
        let step = step_from_location(location)?;
        let next = following_step(step, location)?;
        self.push_step_complete(root, next, step_name)
    }

    /// Complete the current step if `step` lies beyond it, then move to `step`
    pub fn push_step_complete<N: DomNode>(
        &mut self,
        root: &N,
        step: u32,
        step_name: &str,
    ) -> Result<()> {
        if self.current_step < step {
            let event_name = self
                .event_names
                .step_complete
                .replace("{currentStep}", &self.current_step.to_string())
                .replace("{stepName}", step_name);
            let schema = self.schemas.step_complete(self.current_step);
            self.push_event(&event_name, &schema, root)?;
        }

        self.current_step = step;
        Ok(())
    }

    /// A step finished loading; on the last main step this is the summary
    pub fn summary_loaded<N: DomNode>(
        &mut self,
        root: &N,
        location: &str,
        main_step_count: u32,
    ) -> Result<()> {
        let step = step_from_location(location)?;
        if step != main_step_count {
            return Ok(());
        }

        let next = following_step(self.current_step, location)?;
        self.push_path_changed(root, next)?;
        let event_name = self.event_names.summary.clone();
        let schema = self.schemas.summary();
        self.push_event(&event_name, &schema, root)
    }

    pub fn added_to_basket<N: DomNode>(&mut self, root: &N) -> Result<()> {
        let event_name = self.event_names.added_to_basket.clone();
        let schema = self.schemas.add_to_basket(self.current_step);
        self.push_event(&event_name, &schema, root)
    }

    /// A choice was made on `chosen`, or on an unknown element when `None`.
    /// The schema is evaluated from the root.
    pub fn choice_made<N: DomNode>(&mut self, root: &N, chosen: Option<&N>) -> Result<()> {
        let Some(schema) = self.schemas.choice_made(self.current_step, chosen) else {
            return Ok(());
        };
        let event_name = self
            .event_names
            .choices_made
            .replace("{currentStep}", &self.current_step.to_string())
            .replace("{configuratorType}", &self.configurator_type);
        self.push_event(&event_name, &schema, root)
    }

    /// A choice was made whose event waits for the recalculated price
    pub fn choice_made_after_price(&mut self) {
        self.choice_pending = true;
    }

    /// The configurator finished calculating the price
    pub fn price_calculated<N: DomNode>(&mut self, root: &N) -> Result<()> {
        if !self.choice_pending {
            return Ok(());
        }
        self.choice_pending = false;
        self.choice_made(root, None)
    }

    /// An information icon was opened on `element`
    pub fn instruction_shown<N: DomNode>(&mut self, root: &N, element: &N) -> Result<()> {
        let Some(schema) =
            self.schemas
                .instruction(self.current_step, &self.configurator_type, element)
        else {
            return Ok(());
        };
        let event_name = self.event_names.information_icon.clone();
        self.push_event(&event_name, &schema, root)
    }

    /// The "next" button was pressed; push every validation error now on the page
    pub fn next_clicked<N: DomNode>(&mut self, root: &N) -> Result<()> {
        let event_name = self.event_names.error_message.clone();
        for schema in self.schemas.errors(self.current_step, &self.configurator_type) {
            self.push_event(&event_name, &schema, root)?;
        }
        Ok(())
    }

    fn push_virtual_pageview<N: DomNode>(&mut self, root: &N, step: u32) -> Result<()> {
        let event_name = self.event_names.virtual_pageview.clone();
        let schema = self.schemas.virtual_pageview(step);
        self.push_event(&event_name, &schema, root)
    }

    /// Next or previous step event, relative to the current step
    fn push_path_changed<N: DomNode>(&mut self, root: &N, step: u32) -> Result<()> {
        let event_name = if step < self.current_step {
            self.event_names.previous_step.clone()
        } else if step > self.current_step {
            self.event_names.next_step.clone()
        } else {
            return Ok(());
        };
        let schema = self.schemas.path_changed(self.current_step, step);
        self.push_event(&event_name, &schema, root)
    }

    /// Push unless the data equals the previously evaluated event
    fn push_event<N: DomNode>(&mut self, event_name: &str, schema: &Schema, start: &N) -> Result<()> {
        let data = schema.evaluate(start)?;
        let fingerprint = serde_json::to_string(&data)?;

        if self.last_event.as_deref() != Some(fingerprint.as_str()) {
            self.tracker.push_custom_data(event_name, schema, data);
        }

        self.last_event = Some(fingerprint);
        Ok(())
    }
}

/// Main step number from a page URL, `?confloc=3-1` gives 3
pub fn step_from_location(location: &str) -> Result<u32> {
    let invalid = |reason: &str| ExtractError::InvalidLocation {
        location: location.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(location).map_err(|e| invalid(&e.to_string()))?;
    let value = url
        .query_pairs()
        .find(|(key, _)| key == LOCATION_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| invalid("missing confloc parameter"))?;

    value
        .split('-')
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| invalid("confloc does not start with a step number"))
}

fn following_step(step: u32, location: &str) -> Result<u32> {
    step.checked_add(1).ok_or_else(|| ExtractError::InvalidLocation {
        location: location.to_string(),
        reason: format!("no step follows step {}", step),
    })
}
