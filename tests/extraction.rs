use schema_extract::{DomNode, Page, Schema, Selector, StructuredDataService, ValueKind};
use serde_json::json;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn offer_schema() -> Schema {
    Schema::new("offer", ".offer").with_selectors(vec![
        Selector::number("price", ".price").mandatory(),
        Selector::text("label", ".label"),
    ])
}

#[test]
fn test_price_with_optional_label() {
    init_logging();
    let page = Page::parse(r#"<div class="offer"><span class="price">12,99</span></div>"#);

    assert_eq!(
        offer_schema().evaluate(&page.root()).unwrap(),
        Some(json!({ "price": 12.99 }))
    );
}

#[test]
fn test_missing_price_voids_offer() {
    init_logging();
    let page = Page::parse(r#"<div class="offer"><span class="label">New</span></div>"#);

    assert_eq!(offer_schema().evaluate(&page.root()).unwrap(), None);
}

#[test]
fn test_product_listing_to_json_ld() {
    init_logging();
    let html = r#"
    <html>
    <head><title>Garden</title></head>
    <body>
        <ol class="products">
            <li class="product" data-sku="C-1">
                <a class="link" href="/chair"><img class="photo" src="/img/chair.png"></a>
                <h2 class="name">Chair</h2>
                <span class="price">€ 49,95</span>
            </li>
            <li class="product" data-sku="T-2">
                <a class="link" href="/table"><img class="photo" src="/img/table.png"></a>
                <h2 class="name">Table</h2>
                <span class="price">€ 1.299,-</span>
            </li>
            <li class="product" data-sku="P-3">
                <h2 class="name">Parasol</h2>
                <span class="price">Sold out</span>
            </li>
        </ol>
    </body>
    </html>
    "#;
    let page = Page::with_base_url(html, "https://garden.example.com/shop/").unwrap();

    let list = Schema::typed("ItemList", "list", ".products").with_schemas(vec![Schema::typed(
        "ListItem",
        "itemListElement",
        ".product",
    )
    .collection()
    .mandatory()
    .with_selectors(vec![
        Selector::index("position"),
        Selector::new("url", ".link", ValueKind::Url),
    ])
    .with_schemas(vec![Schema::typed("Product", "item", "")
        .mandatory()
        .with_selectors(vec![
            Selector::text("sku", "").with_attribute("sku"),
            Selector::text("name", ".name").mandatory(),
            Selector::new("image", ".photo", ValueKind::Image),
        ])
        .with_schemas(vec![Schema::typed("Offer", "offers", "")
            .mandatory()
            .with_selectors(vec![
                Selector::number("price", ".price").mandatory(),
                Selector::fixed("priceCurrency", "EUR"),
            ])])])]);

    let data = StructuredDataService::default()
        .generate(&list, &page.root())
        .unwrap()
        .unwrap();

    assert_eq!(
        data,
        json!({
            "@context": "https://schema.org",
            "@type": "ItemList",
            "itemListElement": [
                {
                    "@type": "ListItem",
                    "position": 0,
                    "url": "https://garden.example.com/chair",
                    "item": {
                        "@type": "Product",
                        "sku": "C-1",
                        "name": "Chair",
                        "image": "https://garden.example.com/img/chair.png",
                        "offers": { "@type": "Offer", "price": 49.95, "priceCurrency": "EUR" }
                    }
                },
                {
                    "@type": "ListItem",
                    "position": 1,
                    "url": "https://garden.example.com/table",
                    "item": {
                        "@type": "Product",
                        "sku": "T-2",
                        "name": "Table",
                        "image": "https://garden.example.com/img/table.png",
                        "offers": { "@type": "Offer", "price": 1299, "priceCurrency": "EUR" }
                    }
                }
            ]
        })
    );
}

#[test]
fn test_index_of_third_child() {
    init_logging();
    let page = Page::parse("<ul><li>a</li><li>b</li><li class=\"c\">c</li></ul>");
    let third = page.root().query_first("li.c").unwrap().unwrap();

    assert_eq!(
        Selector::index("position").evaluate(&third).unwrap(),
        Some(json!(2))
    );
}
