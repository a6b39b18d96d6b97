//! Analytics data layer events
//!
//! Schema results become data layer pushes. Ecommerce events follow the GA4 shape
//! (`{ event, ecommerce: { items } }`); custom events spread the mapping next to
//! the event name. Click bindings connect initiator elements to events and can be
//! dropped and rebuilt whenever the page re-renders.

use log::{info, warn};
use serde_json::{json, Map, Value};

use crate::dom::DomNode;
use crate::error::Result;
use crate::extractors::Schema;
use crate::settings::Settings;

const ITEMS_KEY: &str = "items";

/// An ordered log of pushed events, named like the page's data layer
#[derive(Debug, Clone, Default)]
pub struct DataLayer {
    name: String,
    events: Vec<Value>,
}

impl DataLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, event: Value) {
        info!("Enhanced Ecommerce ({}): {}", self.name, event);
        self.events.push(event);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Value] {
        &self.events
    }

    pub fn last(&self) -> Option<&Value> {
        self.events.last()
    }

    /// Hand the collected events to the transport
    pub fn drain(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.events)
    }
}

/// An ecommerce event definition
#[derive(Debug, Clone)]
pub struct EcommerceEvent<'s> {
    pub name: String,
    pub schema: &'s Schema,
    /// The schema yields only the item list; otherwise it yields the whole
    /// ecommerce object
    pub items_only: bool,
    /// Evaluated from the document root and stored next to the ecommerce object
    pub extra_schemas: &'s [Schema],
}

impl<'s> EcommerceEvent<'s> {
    /// Event whose schema produces the `items` list
    pub fn items(name: impl Into<String>, schema: &'s Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            items_only: true,
            extra_schemas: &[],
        }
    }

    /// Event whose schema produces the complete ecommerce object
    pub fn object(name: impl Into<String>, schema: &'s Schema) -> Self {
        Self {
            items_only: false,
            ..Self::items(name, schema)
        }
    }

    pub fn with_extra_schemas(mut self, extra_schemas: &'s [Schema]) -> Self {
        self.extra_schemas = extra_schemas;
        self
    }
}

/// Builds events from schemas and pushes them to a [`DataLayer`]
#[derive(Debug, Clone)]
pub struct EcommerceTracker {
    settings: Settings,
    data_layer: DataLayer,
}

impl EcommerceTracker {
    pub fn new(settings: Settings) -> Self {
        let data_layer = DataLayer::new(settings.data_layer_name.clone());
        Self {
            settings,
            data_layer,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn data_layer(&self) -> &DataLayer {
        &self.data_layer
    }

    pub fn data_layer_mut(&mut self) -> &mut DataLayer {
        &mut self.data_layer
    }

    /// Push an ecommerce event evaluated from `start`.
    ///
    /// Returns `false` when an object event found no data and the push was
    /// cancelled. Item-only events always push, with an empty list if needed.
    pub fn push_ecommerce_event<N: DomNode>(
        &mut self,
        event: &EcommerceEvent<'_>,
        root: &N,
        start: &N,
    ) -> Result<bool> {
        let data = event.schema.evaluate(start)?;
        let mut event_data = Map::new();
        event_data.insert("event".to_string(), Value::String(event.name.clone()));

        if event.items_only {
            let items = match data {
                Some(Value::Array(mut items)) => {
                    items.truncate(self.settings.max_items);
                    items
                }
                Some(item) => vec![item],
                None => Vec::new(),
            };
            event_data.insert("ecommerce".to_string(), json!({ "items": items }));
        } else {
            let Some(mut data) = data else {
                if self.settings.debug_mode {
                    warn!(
                        "No data was found for the Ecommerce object for '{}'. Cancelling the data layer push.",
                        event.name
                    );
                }
                return Ok(false);
            };

            if let Some(Value::Array(items)) = data.get_mut(ITEMS_KEY) {
                items.truncate(self.settings.max_items);
            }
            event_data.insert(event.schema.name.clone(), data);
        }

        for extra in event.extra_schemas {
            let value = extra.evaluate(root)?.unwrap_or(Value::Null);
            event_data.insert(extra.name.clone(), value);
        }

        // GA4 merges ecommerce objects unless the previous one is cleared first
        self.data_layer.push(json!({ "ecommerce": null }));
        self.data_layer.push(Value::Object(event_data));
        Ok(true)
    }

    /// Push `{ event, ...mapping }` evaluated from `start`
    pub fn push_custom_event<N: DomNode>(
        &mut self,
        event_name: &str,
        schema: &Schema,
        start: &N,
    ) -> Result<()> {
        let data = schema.evaluate(start)?;
        self.push_custom_data(event_name, schema, data);
        Ok(())
    }

    /// Push a custom event from an already evaluated schema result
    pub fn push_custom_data(&mut self, event_name: &str, schema: &Schema, data: Option<Value>) {
        let mut event_data = Map::new();
        event_data.insert("event".to_string(), Value::String(event_name.to_string()));
        match data {
            Some(Value::Object(fields)) => event_data.extend(fields),
            Some(other) => {
                event_data.insert(schema.name.clone(), other);
            }
            None => {
                if self.settings.debug_mode {
                    warn!("Custom event '{}' has no data from schema '{}'.", event_name, schema.name);
                }
            }
        }
        self.data_layer.push(Value::Object(event_data));
    }
}

#[derive(Debug, Clone)]
enum BoundAction<'s> {
    Ecommerce(EcommerceEvent<'s>),
    Custom { event_name: String, schema: &'s Schema },
}

#[derive(Debug, Clone)]
struct ClickBinding<'s, N> {
    element: N,
    action: BoundAction<'s>,
    stop_propagation: bool,
}

/// Result of dispatching a click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickOutcome {
    /// Bindings that pushed an event
    pub pushed: usize,
    /// A binding asked to stop the click from propagating
    pub stop_propagation: bool,
}

/// Click listeners registered on initiator elements
#[derive(Debug, Clone)]
pub struct ClickBindings<'s, N> {
    bindings: Vec<ClickBinding<'s, N>>,
}

impl<'s, N> Default for ClickBindings<'s, N> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl<'s, N: DomNode> ClickBindings<'s, N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an ecommerce event to every initiator of the event's schema.
    ///
    /// Initiators are the schema's containers, or the `initiator_locator` matches
    /// inside each container when the locator is not empty. Returns the number of
    /// elements bound.
    pub fn bind_ecommerce_event(
        &mut self,
        root: &N,
        event: EcommerceEvent<'s>,
        initiator_locator: &str,
        stop_propagation: bool,
    ) -> Result<usize> {
        let elements = initiators(root, event.schema, initiator_locator)?;
        let count = elements.len();
        self.bindings.extend(elements.into_iter().map(|element| ClickBinding {
            element,
            action: BoundAction::Ecommerce(event.clone()),
            stop_propagation,
        }));
        Ok(count)
    }

    /// Bind a custom event, see [`ClickBindings::bind_ecommerce_event`]
    pub fn bind_custom_event(
        &mut self,
        root: &N,
        event_name: &str,
        schema: &'s Schema,
        initiator_locator: &str,
        stop_propagation: bool,
    ) -> Result<usize> {
        let elements = initiators(root, schema, initiator_locator)?;
        let count = elements.len();
        self.bindings.extend(elements.into_iter().map(|element| ClickBinding {
            element,
            action: BoundAction::Custom {
                event_name: event_name.to_string(),
                schema,
            },
            stop_propagation,
        }));
        Ok(count)
    }

    /// Dispatch a click on `target`.
    ///
    /// The click bubbles from the target through its ancestors. Every binding on
    /// an element runs, evaluating from that element; bubbling ends after the first
    /// element with a binding that stops propagation.
    pub fn click(
        &self,
        target: &N,
        root: &N,
        tracker: &mut EcommerceTracker,
    ) -> Result<ClickOutcome> {
        let mut outcome = ClickOutcome::default();
        let mut current = Some(target.clone());

        while let Some(element) = current {
            for binding in self.bindings.iter().filter(|b| b.element == element) {
                outcome.stop_propagation |= binding.stop_propagation;
                let pushed = match &binding.action {
                    BoundAction::Ecommerce(event) => {
                        tracker.push_ecommerce_event(event, root, &binding.element)?
                    }
                    BoundAction::Custom { event_name, schema } => {
                        tracker.push_custom_event(event_name, schema, &binding.element)?;
                        true
                    }
                };
                if pushed {
                    outcome.pushed += 1;
                }
            }

            if outcome.stop_propagation {
                break;
            }
            current = element.parent();
        }
        Ok(outcome)
    }

    /// Remove every binding, e.g. before binding again after a re-render
    pub fn unbind_all(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn initiators<N: DomNode>(root: &N, schema: &Schema, initiator_locator: &str) -> Result<Vec<N>> {
    let containers = if schema.container_locator.is_empty() {
        vec![root.clone()]
    } else {
        root.query_all(&schema.container_locator)?
    };

    if initiator_locator.is_empty() {
        return Ok(containers);
    }

    let mut elements = Vec::new();
    for container in &containers {
        elements.extend(container.query_all(initiator_locator)?);
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;
    use crate::extractors::Selector;

    const LISTING: &str = r#"
    <div class="listing" data-list="Garden">
        <div class="tile" data-id="1"><span class="name">Chair</span><span class="price">19,95</span><button class="buy">Buy</button></div>
        <div class="tile" data-id="2"><span class="name">Table</span><span class="price">149,-</span><button class="buy">Buy</button></div>
        <div class="tile" data-id="3"><span class="name">Parasol</span><button class="buy">Buy</button></div>
    </div>
    "#;

    fn item_selectors() -> Vec<Selector> {
        vec![
            Selector::text("item_id", "").with_attribute("id"),
            Selector::text("item_name", ".name").mandatory(),
            Selector::number("price", ".price").mandatory(),
            Selector::index("index"),
        ]
    }

    #[test]
    fn test_items_event() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let schema = Schema::new("items", ".tile").collection().with_selectors(item_selectors());
        let list = [Schema::new("list", ".listing")
            .with_selectors(vec![Selector::text("name", "").with_attribute("list")])];

        let mut tracker = EcommerceTracker::new(Settings::default());
        let event = EcommerceEvent::items("view_item_list", &schema).with_extra_schemas(&list);
        assert!(tracker.push_ecommerce_event(&event, &root, &root).unwrap());

        let events = tracker.data_layer().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], json!({ "ecommerce": null }));
        assert_eq!(
            events[1],
            json!({
                "event": "view_item_list",
                "ecommerce": { "items": [
                    { "item_id": "1", "item_name": "Chair", "price": 19.95, "index": 0 },
                    { "item_id": "2", "item_name": "Table", "price": 149, "index": 1 }
                ]},
                "list": { "name": "Garden" }
            })
        );
    }

    #[test]
    fn test_items_are_capped() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let schema = Schema::new("items", ".tile")
            .collection()
            .with_selectors(vec![Selector::text("item_name", ".name")]);
        let settings = Settings {
            max_items: 2,
            ..Settings::default()
        };

        let mut tracker = EcommerceTracker::new(settings);
        tracker
            .push_ecommerce_event(&EcommerceEvent::items("view_item_list", &schema), &root, &root)
            .unwrap();
        assert_eq!(
            tracker.data_layer().last().unwrap()["ecommerce"]["items"]
                .as_array()
                .unwrap()
                .len(),
            2
        );

        let nothing = Schema::new("items", ".missing").collection();
        tracker
            .push_ecommerce_event(&EcommerceEvent::items("view_item_list", &nothing), &root, &root)
            .unwrap();
        assert_eq!(
            tracker.data_layer().last().unwrap()["ecommerce"],
            json!({ "items": [] })
        );
    }

    #[test]
    fn test_object_event_cancelled_without_data() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let schema = Schema::new("ecommerce", ".basket")
            .with_selectors(vec![Selector::fixed("currency", "EUR")]);

        let mut tracker = EcommerceTracker::new(Settings::default().with_debug_mode(true));
        let pushed = tracker
            .push_ecommerce_event(&EcommerceEvent::object("purchase", &schema), &root, &root)
            .unwrap();
        assert!(!pushed);
        assert!(tracker.data_layer().events().is_empty());
    }

    #[test]
    fn test_object_event() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let schema = Schema::new("ecommerce", ".listing")
            .with_selectors(vec![Selector::fixed("currency", "EUR")])
            .with_schemas(vec![Schema::new("items", ".tile")
                .collection()
                .with_selectors(vec![Selector::text("item_name", ".name")])]);
        let settings = Settings {
            max_items: 1,
            ..Settings::default()
        };

        let mut tracker = EcommerceTracker::new(settings);
        tracker
            .push_ecommerce_event(&EcommerceEvent::object("view_cart", &schema), &root, &root)
            .unwrap();
        assert_eq!(
            tracker.data_layer().last().unwrap(),
            &json!({
                "event": "view_cart",
                "ecommerce": { "currency": "EUR", "items": [{ "item_name": "Chair" }] }
            })
        );
    }

    #[test]
    fn test_custom_event() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let schema = Schema::new("list", ".listing")
            .with_selectors(vec![Selector::text("list_name", "").with_attribute("list")]);

        let mut tracker = EcommerceTracker::new(Settings::default());
        tracker.push_custom_event("list_seen", &schema, &root).unwrap();
        assert_eq!(
            tracker.data_layer().last().unwrap(),
            &json!({ "event": "list_seen", "list_name": "Garden" })
        );

        let missing = Schema::new("list", ".nope");
        tracker.push_custom_event("list_seen", &missing, &root).unwrap();
        assert_eq!(tracker.data_layer().last().unwrap(), &json!({ "event": "list_seen" }));
    }

    #[test]
    fn test_click_bindings() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let schema = Schema::event("items", ".tile", true).with_selectors(item_selectors());

        let mut tracker = EcommerceTracker::new(Settings::default());
        let mut bindings = ClickBindings::new();
        let bound = bindings
            .bind_ecommerce_event(&root, EcommerceEvent::items("add_to_cart", &schema), "button.buy", true)
            .unwrap();
        assert_eq!(bound, 3);

        let buttons = root.query_all("button.buy").unwrap();
        let outcome = bindings.click(&buttons[1], &root, &mut tracker).unwrap();
        assert_eq!(outcome, ClickOutcome { pushed: 1, stop_propagation: true });
        assert_eq!(
            tracker.data_layer().last().unwrap()["ecommerce"]["items"],
            json!([{ "item_id": "2", "item_name": "Table", "price": 149, "index": 1 }])
        );

        // the third tile has no price: still an items push, with no items
        bindings.click(&buttons[2], &root, &mut tracker).unwrap();
        assert_eq!(tracker.data_layer().last().unwrap()["ecommerce"]["items"], json!([]));

        // clicking something unbound does nothing
        let name = root.query_first(".name").unwrap().unwrap();
        assert_eq!(bindings.click(&name, &root, &mut tracker).unwrap(), ClickOutcome::default());

        bindings.unbind_all();
        assert!(bindings.is_empty());
        let before = tracker.data_layer().events().len();
        bindings.click(&buttons[0], &root, &mut tracker).unwrap();
        assert_eq!(tracker.data_layer().events().len(), before);
    }

    #[test]
    fn test_custom_click_binding_on_container() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let schema = Schema::event("tile", ".tile", false)
            .with_selectors(vec![Selector::text("id", "").with_attribute("id")]);

        let mut tracker = EcommerceTracker::new(Settings::default());
        let mut bindings = ClickBindings::new();
        assert_eq!(bindings.bind_custom_event(&root, "tile_click", &schema, "", true).unwrap(), 3);

        // a click on a child bubbles up to the bound tile
        let names = root.query_all(".tile > span.name").unwrap();
        let outcome = bindings.click(&names[1], &root, &mut tracker).unwrap();
        assert_eq!(outcome, ClickOutcome { pushed: 1, stop_propagation: true });
        assert_eq!(
            tracker.data_layer().last().unwrap(),
            &json!({ "event": "tile_click", "id": "2" })
        );

        // nothing is bound above the tiles
        let listing = root.query_first(".listing").unwrap().unwrap();
        assert_eq!(bindings.click(&listing, &root, &mut tracker).unwrap(), ClickOutcome::default());
        assert_eq!(tracker.data_layer().events().len(), 1);
    }

    #[test]
    fn test_stop_propagation_ends_bubbling() {
        let page = Page::parse(LISTING);
        let root = page.root();
        let items = Schema::event("items", ".tile", true).with_selectors(item_selectors());
        let tile = Schema::event("tile", ".tile", false)
            .with_selectors(vec![Selector::text("id", "").with_attribute("id")]);
        let listing = Schema::event("listing", ".listing", false)
            .with_selectors(vec![Selector::text("list", "").with_attribute("list")]);

        let mut bindings = ClickBindings::new();
        bindings
            .bind_ecommerce_event(&root, EcommerceEvent::items("add_to_cart", &items), "button.buy", false)
            .unwrap();
        bindings.bind_custom_event(&root, "tile_click", &tile, "", true).unwrap();
        bindings.bind_custom_event(&root, "list_click", &listing, "", false).unwrap();

        // button, then tile; the tile stops the click before the listing
        let mut tracker = EcommerceTracker::new(Settings::default());
        let buttons = root.query_all("button.buy").unwrap();
        let outcome = bindings.click(&buttons[0], &root, &mut tracker).unwrap();
        assert_eq!(outcome, ClickOutcome { pushed: 2, stop_propagation: true });

        let events = tracker.data_layer_mut().drain();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], json!({ "ecommerce": null }));
        assert_eq!(events[1]["event"], "add_to_cart");
        assert_eq!(events[2], json!({ "event": "tile_click", "id": "1" }));
        assert!(tracker.data_layer().events().is_empty());

        // a click beside the tiles reaches only the listing
        let listing_el = root.query_first(".listing").unwrap().unwrap();
        let outcome = bindings.click(&listing_el, &root, &mut tracker).unwrap();
        assert_eq!(outcome, ClickOutcome { pushed: 1, stop_propagation: false });
        assert_eq!(
            tracker.data_layer().events(),
            &[json!({ "event": "list_click", "list": "Garden" })]
        );
    }
}
