// src/utils/url.rs

//! URL construction for the timetable site.

use url::Url;

use crate::error::Result;

/// Schedule page of one group for one period.
///
/// # Examples
/// ```
/// use timetable_crawler::utils::url::timetable_url;
///
/// let url = timetable_url("http://planzajec.uek.krakow.pl/", 1234, 3).unwrap();
/// assert_eq!(
///     url.as_str(),
///     "http://planzajec.uek.krakow.pl/index.php?typ=G&id=1234&okres=3"
/// );
/// ```
pub fn timetable_url(base: &str, group: u32, period: u32) -> Result<Url> {
    let mut url = Url::parse(base)?.join("index.php")?;
    url.query_pairs_mut()
        .append_pair("typ", "G")
        .append_pair("id", &group.to_string())
        .append_pair("okres", &period.to_string());
    Ok(url)
}

/// Resolve a potentially relative link against the page it was found on.
pub fn resolve_url(base: &Url, href: &str) -> Result<Url> {
    Ok(base.join(href)?)
}
