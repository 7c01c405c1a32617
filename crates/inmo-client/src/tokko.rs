//! Site adapter for agencies running Tokko Broker.
//!
//! Tokko sites share one template: a `/Buscar` results page listing every
//! published property, and a detail page per listing built around
//! `#ficha_detalle_cuerpo`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use inmo_core::error::AppError;
use inmo_core::models::{Currency, FeatureMap, PropertyDetails, PropertyStub};
use inmo_core::traits::{Fetcher, SiteAdapter};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::parse::{self, element_text, fold};

static RESULT_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#propiedades.resultados-list li").unwrap());
static PRICE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".prop-valor-nro").unwrap());
static CODE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".codref").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".prop-desc-tipo-ub").unwrap());
static ADDRESS: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".prop-desc-dir").unwrap());
static COVER_IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".dest-img").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

static DETAIL_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#ficha_detalle_cuerpo").unwrap());
static DETAIL_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#ficha_detalle_cuerpo .ficha_detalle_item").unwrap());
static BASIC_INFO: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#lista_informacion_basica li").unwrap());
static SURFACES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#lista_superficies li").unwrap());
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#prop-desc").unwrap());
static SLIDER_IMAGES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#ficha_slider .slides li:not(.bx-clone) img").unwrap()
});
static MAP: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[data-lat][data-lng]").unwrap());
static PAGE_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static FEATURE_HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.titulo2").unwrap());
static LIST_ITEMS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());

/// Feature section headings and the category each one feeds.
const FEATURE_SECTIONS: &[(&str, &str)] = &[
    ("servicios", "servicio"),
    ("ambientes", "ambiente"),
    ("adicionales", "adicional"),
];

/// Scrapes one Tokko Broker site.
#[derive(Clone)]
pub struct TokkoAdapter<F> {
    base_url: Url,
    fetcher: F,
}

impl<F: Fetcher> TokkoAdapter<F> {
    pub fn new(base_url: &str, fetcher: F) -> Result<Self, AppError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(&format!("{trimmed}/"))
            .map_err(|e| AppError::ConfigError(format!("Invalid agency URL {base_url}: {e}")))?;
        Ok(Self { base_url, fetcher })
    }

    pub fn search_url(&self) -> String {
        format!("{}Buscar", self.base_url)
    }
}

impl<F: Fetcher> SiteAdapter for TokkoAdapter<F> {
    async fn search_properties(&self) -> Result<Vec<PropertyStub>, AppError> {
        let url = self.search_url();
        tracing::info!(%url, "Searching Tokko listings");
        let html = self.fetcher.fetch(&url).await?;
        let stubs = parse_search(&html, &self.base_url);
        tracing::info!(%url, found = stubs.len(), "Tokko search parsed");
        Ok(stubs)
    }

    async fn property_details(&self, url: &str) -> Result<PropertyDetails, AppError> {
        let html = self.fetcher.fetch(url).await?;
        parse_details(&html, url)
    }
}

/// Listing stubs from a `/Buscar` results page. Items without a code are skipped.
pub fn parse_search(html: &str, base: &Url) -> Vec<PropertyStub> {
    let doc = Html::parse_document(html);
    doc.select(&RESULT_ITEMS)
        .filter_map(|item| parse_result_item(item, base))
        .collect()
}

fn parse_result_item(item: ElementRef<'_>, base: &Url) -> Option<PropertyStub> {
    let code = first_text(item, &CODE)?;
    let code = parse::value_after_colon(&code).unwrap_or(code);

    let Some(url) = item
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| resolve(base, href))
    else {
        tracing::debug!(%code, "Listing without link, skipping");
        return None;
    };

    let price = first_text(item, &PRICE).unwrap_or_default();
    Some(PropertyStub {
        currency: Currency::from_price_text(&price),
        price,
        title: first_text(item, &TITLE).unwrap_or_default(),
        address: first_text(item, &ADDRESS),
        image_url: item
            .select(&COVER_IMAGE)
            .next()
            .and_then(image_src)
            .and_then(|src| resolve(base, src)),
        code,
        url,
    })
}

/// Detail attributes from a listing page.
///
/// A page without the detail body is a removed listing: Tokko keeps serving
/// a generic page with status 200 for those.
pub fn parse_details(html: &str, page_url: &str) -> Result<PropertyDetails, AppError> {
    let doc = Html::parse_document(html);
    if doc.select(&DETAIL_BODY).next().is_none() {
        return Err(AppError::NotFound(page_url.to_string()));
    }
    let base = Url::parse(page_url).ok();

    let detail_items: Vec<String> = doc.select(&DETAIL_ITEMS).map(element_text).collect();
    let basic: Vec<String> = doc.select(&BASIC_INFO).map(element_text).collect();
    let surfaces: Vec<String> = doc.select(&SURFACES).map(element_text).collect();

    let labelled = |label: &str| {
        labelled_value(&basic, label).or_else(|| detail_value(&detail_items, label))
    };

    let title = doc.select(&PAGE_TITLE).next().map(element_text).unwrap_or_default();
    let (latitude, longitude) = coordinates(&doc);

    Ok(PropertyDetails {
        property_type: detail_value(&detail_items, "Tipo de Propiedad"),
        location: detail_value(&detail_items, "Ubicación"),
        description: doc
            .select(&DESCRIPTION)
            .next()
            .map(element_text)
            .filter(|d| !d.is_empty()),
        bedrooms: labelled_value(&basic, "Dormitorios").and_then(|v| parse::first_int(&v)),
        bathrooms: labelled_value(&basic, "Baños").and_then(|v| parse::first_int(&v)),
        rooms: labelled_value(&basic, "Ambientes").and_then(|v| parse::first_int(&v)),
        floors: labelled_value(&basic, "Plantas").and_then(|v| parse::first_int(&v)),
        garages: labelled_value(&basic, "Cocheras").and_then(|v| parse::first_int(&v)),
        age: labelled_value(&basic, "Antigüedad").and_then(|v| parse::age(&v)),
        covered_area: labelled_value(&surfaces, "Cubierta")
            .and_then(|v| parse::area(&v))
            .or_else(|| detail_value(&detail_items, "Total construido").and_then(|v| parse::area(&v))),
        total_area: labelled_value(&surfaces, "Superficie Total").and_then(|v| parse::area(&v)),
        land_area: labelled_value(&surfaces, "Terreno").and_then(|v| parse::area(&v)),
        front: labelled_value(&surfaces, "Frente").and_then(|v| parse::first_number(&v)),
        back: labelled_value(&surfaces, "Fondo").and_then(|v| parse::first_number(&v)),
        situation: labelled_value(&basic, "Situación"),
        expenses: labelled_value(&basic, "Expensas").and_then(|v| parse::first_number(&v)),
        operation: parse::operation(&title).or_else(|| parse::operation(page_url)),
        condition: labelled("Condición"),
        orientation: labelled("Orientación"),
        disposition: labelled("Disposición"),
        latitude,
        longitude,
        images: slider_images(&doc, base.as_ref()),
        features: features(&doc),
    })
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn image_src(img: ElementRef<'_>) -> Option<&str> {
    let value = img.value();
    value
        .attr("src")
        .or_else(|| value.attr("data-src"))
        .filter(|s| !s.trim().is_empty())
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Value of the first `"Label: value"` line whose text mentions `label`.
fn labelled_value(lines: &[String], label: &str) -> Option<String> {
    let label = fold(label);
    lines
        .iter()
        .find(|line| fold(line).contains(&label))
        .and_then(|line| parse::value_after_colon(line))
}

/// Text following `label` in a `"Label Value"` detail item.
fn detail_value(items: &[String], label: &str) -> Option<String> {
    let folded_label = fold(label);
    let label_chars = label.chars().count();
    items.iter().find_map(|item| {
        if !fold(item).starts_with(&folded_label) {
            return None;
        }
        let value: String = item.chars().skip(label_chars).collect();
        let value = value.trim().trim_start_matches(':').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn slider_images(doc: &Html, base: Option<&Url>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    doc.select(&SLIDER_IMAGES)
        .filter_map(image_src)
        .filter_map(|src| match base {
            Some(base) => resolve(base, src),
            None => Some(src.to_string()),
        })
        .filter(|src| seen.insert(src.clone()))
        .collect()
}

fn coordinates(doc: &Html) -> (Option<f64>, Option<f64>) {
    let Some(map) = doc.select(&MAP).next() else {
        return (None, None);
    };
    let attr = |name: &str| {
        map.value()
            .attr(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
    };
    (attr("data-lat"), attr("data-lng"))
}

/// Feature lists introduced by a `div.titulo2` heading and held in the
/// `ul.ficha_ul` right after it.
fn features(doc: &Html) -> FeatureMap {
    let mut map = FeatureMap::new();
    for heading in doc.select(&FEATURE_HEADINGS) {
        let heading_text = fold(&element_text(heading));
        let Some((_, category)) = FEATURE_SECTIONS
            .iter()
            .find(|(title, _)| heading_text == *title)
        else {
            continue;
        };

        let Some(list) = heading.next_siblings().find_map(ElementRef::wrap) else {
            continue;
        };
        let is_feature_list =
            list.value().name() == "ul" && list.value().classes().any(|c| c == "ficha_ul");
        if !is_feature_list {
            continue;
        }

        let names: BTreeSet<String> = list
            .select(&LIST_ITEMS)
            .map(element_text)
            .filter(|name| !name.is_empty())
            .collect();
        if !names.is_empty() {
            map.entry((*category).to_string()).or_default().extend(names);
        }
    }
    map
}
