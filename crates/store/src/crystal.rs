//! Scraper for storefronts built on the Crystal Commerce platform.
//!
//! Stores sharing this page template are implemented once here; the
//! registry instantiates one `CrystalCommerceStorefront` per store
//! profile whose `fetch_strategy` is `"crystal_commerce"`.
//!
//! The scraping chain is search page → per-product detail page. Each
//! failure is contained at the smallest unit: a failed detail fetch nulls
//! that row's static fields and siblings continue; a malformed variant
//! row is skipped and siblings continue; an exhausted fetch yields an
//! empty result, indistinguishable from out-of-stock.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use cardwatch_core::{parse_price, Listing, ListingIdentity};

use crate::client::HttpFetcher;
use crate::sets::SetCodeLookup;
use crate::storefront::{StoreProfile, Storefront};

pub struct CrystalCommerceStorefront {
    profile: StoreProfile,
    fetcher: Arc<HttpFetcher>,
    sets: Arc<SetCodeLookup>,
}

/// One product entry on the search results page, with its in-stock
/// variant rows.
#[derive(Debug)]
struct ProductRow {
    name: String,
    url: String,
    variants: Vec<VariantRow>,
}

/// One in-stock variant of a product.
#[derive(Debug)]
struct VariantRow {
    condition: String,
    finish: String,
    price: Decimal,
    stock: u32,
}

/// Static card details from the product detail page.
#[derive(Debug, Default)]
struct DetailInfo {
    set_code: Option<String>,
    collector_number: Option<String>,
}

impl CrystalCommerceStorefront {
    pub fn new(profile: StoreProfile, fetcher: Arc<HttpFetcher>, sets: Arc<SetCodeLookup>) -> Self {
        Self {
            profile,
            fetcher,
            sets,
        }
    }
}

#[async_trait]
impl Storefront for CrystalCommerceStorefront {
    fn profile(&self) -> &StoreProfile {
        &self.profile
    }

    async fn scrape_listings(&self, card_name: &str) -> Vec<Listing> {
        let Some(body) = self
            .fetcher
            .fetch(&self.profile.search_url, &[("q", card_name), ("c", "1")])
            .await
        else {
            return Vec::new();
        };

        let products = parse_search_page(&body, card_name, &self.profile.homepage);
        debug!(
            store = %self.profile.slug,
            card_name,
            products = products.len(),
            "parsed search page"
        );

        let mut listings = Vec::new();
        let mut seen: HashSet<ListingIdentity> = HashSet::new();

        for product in products {
            let detail = match self.fetcher.fetch(&product.url, &[]).await {
                Some(html) => parse_detail_page(&html, &self.sets),
                None => {
                    // Siblings continue; this row just loses its static fields.
                    warn!(
                        store = %self.profile.slug,
                        url = %product.url,
                        "detail page fetch failed, keeping row without set/collector data"
                    );
                    DetailInfo::default()
                }
            };

            assemble_listings(&self.profile.slug, &product, &detail, &mut seen, &mut listings);
        }

        listings
    }
}

/// Turn one product's variants into deduplicated listings.
///
/// `seen` spans the whole page so duplicate-identity rows across products
/// are suppressed too.
fn assemble_listings(
    store_id: &str,
    product: &ProductRow,
    detail: &DetailInfo,
    seen: &mut HashSet<ListingIdentity>,
    out: &mut Vec<Listing>,
) {
    for variant in &product.variants {
        let listing = Listing {
            store_id: store_id.to_string(),
            card_name: product.name.clone(),
            set_code: detail.set_code.clone(),
            collector_number: detail.collector_number.clone(),
            finish: variant.finish.clone(),
            price: variant.price,
            stock_count: variant.stock,
            condition: variant.condition.clone(),
            url: product.url.clone(),
        }
        .normalize();

        if seen.insert(listing.identity()) {
            out.push(listing);
        }
    }
}

/// Parse the search results page into product rows.
///
/// Results are ordered by relevance; the first product whose name does
/// not exactly match the searched card ends the scan — everything after
/// it is fuzzy-match noise.
fn parse_search_page(html: &str, card_name: &str, homepage: &str) -> Vec<ProductRow> {
    let document = Html::parse_document(html);
    let Ok(product_sel) = Selector::parse("li.product") else {
        return Vec::new();
    };

    let mut products = Vec::new();
    for product in document.select(&product_sel) {
        let name = product_name(&product);
        if name.is_empty() || !name.eq_ignore_ascii_case(card_name) {
            debug!(
                found = %name,
                searched = card_name,
                "non-matching result, stopping search scan"
            );
            break;
        }

        let url = product_url(&product, homepage);
        let variants = parse_variants(&product);
        products.push(ProductRow {
            name,
            url,
            variants,
        });
    }
    products
}

/// Product name from the `h4.name` title attribute, stripped of the
/// " - Set Name" suffix Crystal Commerce appends.
fn product_name(product: &ElementRef<'_>) -> String {
    let Ok(name_sel) = Selector::parse("h4.name") else {
        return String::new();
    };
    product
        .select(&name_sel)
        .next()
        .and_then(|el| el.value().attr("title"))
        .map(|title| {
            title
                .split(" - ")
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

/// Absolute product URL from the `a[itemprop='url']` link.
fn product_url(product: &ElementRef<'_>, homepage: &str) -> String {
    let Ok(link_sel) = Selector::parse("a[itemprop='url']") else {
        return String::new();
    };
    let href = product
        .select(&link_sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .unwrap_or_default();

    match Url::parse(homepage).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Parse all in-stock variant rows of one product. Malformed rows are
/// skipped; siblings continue.
fn parse_variants(product: &ElementRef<'_>) -> Vec<VariantRow> {
    let Ok(row_sel) = Selector::parse("div.variant-row.in-stock") else {
        return Vec::new();
    };

    let mut variants = Vec::new();
    for row in product.select(&row_sel) {
        match parse_variant_row(&row) {
            Ok(variant) => variants.push(variant),
            Err(reason) => {
                warn!(reason, "failed to parse a variant row, skipping");
            }
        }
    }
    variants
}

fn parse_variant_row(row: &ElementRef<'_>) -> Result<VariantRow, String> {
    let description = select_text(row, ".variant-description")
        .ok_or_else(|| "missing variant description".to_string())?;
    let condition = description
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    let finish = if description.to_lowercase().contains("foil") {
        "foil".to_string()
    } else {
        "non-foil".to_string()
    };

    // The add-to-cart form's data attribute is authoritative; the visible
    // price element is the fallback.
    let price_raw = select_attr(row, "form.add-to-cart-form", "data-price")
        .or_else(|| select_text(row, ".price"))
        .ok_or_else(|| "missing price".to_string())?;
    let price = parse_price(&price_raw).map_err(|e| e.to_string())?;

    let qty_text =
        select_text(row, ".variant-qty").ok_or_else(|| "missing quantity".to_string())?;
    let stock = qty_text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .parse::<u32>()
        .map_err(|e| format!("bad quantity {qty_text:?}: {e}"))?;

    Ok(VariantRow {
        condition,
        finish,
        price,
        stock,
    })
}

/// Parse the product detail page for canonical card information.
///
/// Anything missing stays `None` — the listing still counts, it just
/// loses precision for specification filtering.
fn parse_detail_page(html: &str, sets: &SetCodeLookup) -> DetailInfo {
    let document = Html::parse_document(html);
    let Ok(info_sel) = Selector::parse("div.product-more-info") else {
        return DetailInfo::default();
    };
    let Some(info) = document.select(&info_sel).next() else {
        return DetailInfo::default();
    };

    let set_code = select_text(&info, "div.set-name a").and_then(|name| sets.code_for(&name));

    let collector_number = select_text(&info, "div.card-number a").map(|raw| {
        // Printed as "263/342"; only the numerator identifies the card.
        raw.split('/').next().unwrap_or_default().trim().to_string()
    });

    DetailInfo {
        set_code,
        collector_number,
    }
}

fn select_text(scope: &ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let text: String = scope.select(&selector).next()?.text().collect();
    let trimmed = text.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn select_attr(scope: &ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    scope
        .select(&selector)
        .next()?
        .value()
        .attr(attr)
        .map(str::to_string)
}
