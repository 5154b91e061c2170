// src/services/groups.rs

//! Group association scraper.
//!
//! Crawls the category pages of the schedule site to build the
//! group name -> numeric id map used to resolve human-readable groups.

use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::GroupAssociations;
use crate::utils::{http, resolve_url};

const CATEGORY_SELECTOR: &str = ".kategorie > a";
const GROUP_LINK_SELECTOR: &str = ".kolumny a";
const GROUP_CATEGORY_MARKER: &str = "typ=G";
const GROUP_ID_PATTERN: &str = r"id=(\d+)";

/// Service for scraping group ids from the schedule site.
pub struct GroupScraper<'a> {
    client: &'a Client,
    base_url: Url,
    delay: Duration,
    category: Selector,
    group_link: Selector,
    group_id: Regex,
}

impl<'a> GroupScraper<'a> {
    /// Create a new scraper; `delay` is slept between category page fetches.
    pub fn new(client: &'a Client, base_url: &str, delay: Duration) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            delay,
            category: parse_selector(CATEGORY_SELECTOR)?,
            group_link: parse_selector(GROUP_LINK_SELECTOR)?,
            group_id: Regex::new(GROUP_ID_PATTERN)?,
        })
    }

    /// Scrape every group category.
    ///
    /// The first unexpected page structure aborts the scrape, so a format
    /// change upstream is never reported as an empty map.
    pub async fn scrape(&self) -> Result<GroupAssociations> {
        let index = http::fetch_bytes(self.client, self.base_url.as_str()).await?;
        let index = String::from_utf8_lossy(&index).into_owned();
        let categories = self.extract_categories(&Html::parse_document(&index))?;
        log::info!("Found {} group categories", categories.len());

        let mut associations = GroupAssociations::new();
        for (i, (name, url)) in categories.into_iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let page = http::fetch_bytes(self.client, url.as_str()).await?;
            let page = String::from_utf8_lossy(&page).into_owned();
            let groups = self.extract_groups(&Html::parse_document(&page))?;
            log::info!("  {}: {} groups", name, groups.len());

            associations.category_mut(&name).extend(groups);
        }

        Ok(associations)
    }

    /// Category links that list student groups, resolved to absolute URLs.
    fn extract_categories(&self, document: &Html) -> Result<Vec<(String, Url)>> {
        let mut categories = Vec::new();
        for link in document.select(&self.category) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !href.contains(GROUP_CATEGORY_MARKER) {
                continue;
            }
            let name = link.text().collect::<String>().trim().to_string();
            if name.is_empty() {
                continue;
            }
            categories.push((name, resolve_url(&self.base_url, href)?));
        }

        if categories.is_empty() {
            return Err(AppError::format(format!(
                "no group categories found under '{CATEGORY_SELECTOR}'"
            )));
        }
        Ok(categories)
    }

    /// `(group name, group id)` pairs of one category page.
    fn extract_groups(&self, document: &Html) -> Result<Vec<(String, u32)>> {
        let groups = document
            .select(&self.group_link)
            .map(|link| {
                let name = link.text().collect::<String>().trim().to_string();
                let href = link.value().attr("href").ok_or_else(|| {
                    AppError::format(format!("group link '{name}' has no href"))
                })?;
                let id = self
                    .group_id
                    .captures(href)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .ok_or_else(|| {
                        AppError::format(format!("no group id in link '{href}'"))
                    })?;
                Ok((name, id))
            })
            .collect::<Result<Vec<_>>>()?;

        if groups.is_empty() {
            return Err(AppError::format(format!(
                "no group links found under '{GROUP_LINK_SELECTOR}'"
            )));
        }
        Ok(groups)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
