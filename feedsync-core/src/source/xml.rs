//! Catalog documents parsed with roxmltree.
//!
//! The document text is kept in memory and parsed on each `read_rows`; the
//! schema inferrer caches the resulting rows, so a table is normally parsed
//! once. Non-leaf children are serialized as their verbatim source markup.
//! Documents are read from local files or downloaded over HTTP(S).

use super::tree::{CatalogNode, flatten_node};
use super::RowSource;
use crate::config::TableRegistry;
use crate::models::Row;
use crate::{
    Result,
    error::{FeedSyncError, redact_database_url},
};
use roxmltree::{Document, Node, ParsingOptions};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

impl<'a, 'input> CatalogNode for Node<'a, 'input> {
    fn tag(&self) -> &str {
        self.tag_name().name()
    }

    // Prefixed attributes keep their prefix so `x:id` never collides with `id`.
    fn attributes(&self) -> Vec<(String, String)> {
        Node::attributes(self)
            .map(|attr| {
                let name = match attr.namespace().and_then(|uri| self.lookup_prefix(uri)) {
                    Some(prefix) => format!("{}:{}", prefix, attr.name()),
                    None => attr.name().to_string(),
                };
                (name, attr.value().to_string())
            })
            .collect()
    }

    fn child_elements(&self) -> Vec<Self> {
        self.children().filter(Node::is_element).collect()
    }

    fn direct_text(&self) -> String {
        self.children()
            .filter(Node::is_text)
            .filter_map(|n| n.text())
            .collect()
    }

    fn markup(&self) -> String {
        self.document().input_text()[self.range()].to_string()
    }
}

/// A catalog document plus the table layout used to read it.
#[derive(Debug, Clone)]
pub struct XmlCatalog {
    text: String,
    tables: TableRegistry,
}

impl XmlCatalog {
    /// Builds a catalog from document text.
    ///
    /// # Errors
    /// Returns a `Source` error if the text is not well-formed XML.
    pub fn from_text(text: impl Into<String>, tables: TableRegistry) -> Result<Self> {
        let catalog = Self {
            text: text.into(),
            tables,
        };
        catalog.parse()?;
        Ok(catalog)
    }

    /// Reads a catalog from a file path, a `file://` URL, or an `http(s)` URL.
    ///
    /// # Errors
    /// Returns a `Configuration` error for unsupported URL schemes, an `Io`
    /// error if a file cannot be read, and a `Source` error if a download
    /// fails or the text is not well-formed XML.
    pub async fn load(location: &str, tables: TableRegistry) -> Result<Self> {
        let text = match resolve_location(location)? {
            CatalogLocation::File(path) => {
                tracing::info!("Loading catalog from {}", path.display());
                tokio::fs::read_to_string(&path).await.map_err(|e| {
                    FeedSyncError::io(format!("Failed to read catalog {}", path.display()), e)
                })?
            }
            CatalogLocation::Remote(url) => fetch_remote(&url).await?,
        };
        Self::from_text(text, tables)
    }

    /// Table layout this catalog is read with.
    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    fn parse(&self) -> Result<Document<'_>> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        Document::parse_with_options(&self.text, options)
            .map_err(|e| FeedSyncError::source_failed("Failed to parse catalog XML", e))
    }
}

/// Where a catalog document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CatalogLocation {
    File(PathBuf),
    Remote(Url),
}

fn resolve_location(location: &str) -> Result<CatalogLocation> {
    let location = location.trim();
    if location.is_empty() {
        return Err(FeedSyncError::configuration("catalog location is required"));
    }

    match Url::parse(location) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(CatalogLocation::File)
            .map_err(|()| {
                FeedSyncError::configuration(format!("Invalid file URL: {}", location))
            }),
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(CatalogLocation::Remote(url)),
        // Single-letter schemes are Windows drive letters.
        Ok(url) if url.scheme().len() > 1 => Err(FeedSyncError::configuration(format!(
            "Unsupported catalog URL scheme '{}': use a path, file://, http:// or https://",
            url.scheme()
        ))),
        _ => Ok(CatalogLocation::File(PathBuf::from(location))),
    }
}

async fn fetch_remote(url: &Url) -> Result<String> {
    let redacted = redact_database_url(url.as_str());
    tracing::info!("Fetching catalog from {}", redacted);

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FeedSyncError::source_failed("Failed to build HTTP client", e))?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            FeedSyncError::source_failed(
                format!("Failed to fetch catalog {}", redacted),
                e.without_url(),
            )
        })?;

    let text = response.text().await.map_err(|e| {
        FeedSyncError::source_failed(
            format!("Failed to read catalog body {}", redacted),
            e.without_url(),
        )
    })?;
    tracing::debug!("Fetched {} bytes from {}", text.len(), redacted);
    Ok(text)
}

impl RowSource for XmlCatalog {
    fn table_names(&self) -> Vec<String> {
        self.tables.names()
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Row>> {
        let config = self.tables.require(table)?;
        let document = self.parse()?;

        let mut nodes = vec![document.root_element()];
        for step in &config.path {
            nodes = nodes
                .iter()
                .flat_map(|node| node.children())
                .filter(|child| child.is_element() && child.tag_name().name() == step)
                .collect();
        }

        let rows: Vec<Row> = nodes
            .iter()
            .map(|node| flatten_node(node, config.text_column.as_deref()))
            .collect();
        tracing::debug!(
            "Found {} '{}' elements for table '{}'",
            rows.len(),
            config.path.join("/"),
            table
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE yml_catalog SYSTEM "shops.dtd">
<yml_catalog date="2024-01-01 10:00">
  <shop>
    <name>Lamp Store</name>
    <currencies>
      <currency id="RUR" rate="1"/>
      <currency id="USD" rate="90.5"/>
    </currencies>
    <categories>
      <category id="1">Lighting</category>
      <category id="2" parentId="1">  Desk lamps </category>
    </categories>
    <offers>
      <offer id="10" available="true">
        <vendorCode>101</vendorCode>
        <price>9.99</price>
        <description><![CDATA[<p>Bright</p>]]></description>
        <param name="Color">Red</param>
        <delivery>
          <option cost="0" days="1"/>
        </delivery>
      </offer>
      <offer id="11" available="false">
        <vendorCode> </vendorCode>
        <price>1</price>
      </offer>
    </offers>
  </shop>
</yml_catalog>
"#;

    fn catalog() -> XmlCatalog {
        XmlCatalog::from_text(CATALOG, TableRegistry::catalog_defaults()).unwrap()
    }

    #[test]
    fn test_reads_currency_attributes() {
        let rows = catalog().read_rows("currency").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("id"), Some("USD"));
        assert_eq!(rows[1].get("rate"), Some("90.5"));
    }

    #[test]
    fn test_categories_get_value_column() {
        let rows = catalog().read_rows("categories").unwrap();
        assert_eq!(rows[0].get("value"), Some("Lighting"));
        assert_eq!(rows[1].get("value"), Some("Desk lamps"));
        assert_eq!(rows[1].get("parentId"), Some("1"));
    }

    #[test]
    fn test_offer_children_flattened() {
        let rows = catalog().read_rows("offers").unwrap();
        let first = &rows[0];

        assert_eq!(first.get("vendorCode"), Some("101"));
        assert_eq!(first.get("description"), Some("<p>Bright</p>"));
        assert_eq!(first.get("param"), Some("Red"));
        assert_eq!(
            first.get("delivery"),
            Some("<delivery>\n          <option cost=\"0\" days=\"1\"/>\n        </delivery>")
        );
        // Blank leaf becomes null
        assert!(rows[1].contains_key("vendorCode"));
        assert_eq!(rows[1].get("vendorCode"), None);
    }

    #[test]
    fn test_prefixed_attributes_keep_prefix() {
        let text = r#"<yml_catalog xmlns:x="urn:example:x"><shop><offers>
            <offer x:id="1" id="2"><vendorCode>5</vendorCode></offer>
        </offers></shop></yml_catalog>"#;
        let catalog = XmlCatalog::from_text(text, TableRegistry::catalog_defaults()).unwrap();
        let rows = catalog.read_rows("offers").unwrap();

        assert_eq!(rows[0].get("x:id"), Some("1"));
        assert_eq!(rows[0].get("id"), Some("2"));

        // The prefixed name is not a valid column, so DDL generation refuses it.
        let schema = crate::inference::infer_schema("offers", &rows, Some("vendorCode"));
        assert!(matches!(
            crate::ddl::create_table_sql("offers", &schema, Some("vendorCode")),
            Err(FeedSyncError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_unknown_table() {
        assert!(matches!(
            catalog().read_rows("orders"),
            Err(FeedSyncError::UnknownTable { .. })
        ));
    }

    #[test]
    fn test_missing_section_yields_no_rows() {
        let text = "<yml_catalog><shop><offers/></shop></yml_catalog>";
        let catalog = XmlCatalog::from_text(text, TableRegistry::catalog_defaults()).unwrap();
        assert!(catalog.read_rows("offers").unwrap().is_empty());
        assert!(catalog.read_rows("currency").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        let result = XmlCatalog::from_text("<shop><offers>", TableRegistry::catalog_defaults());
        assert!(matches!(result, Err(FeedSyncError::Source { .. })));
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(
            resolve_location("/tmp/feed.xml").unwrap(),
            CatalogLocation::File(PathBuf::from("/tmp/feed.xml"))
        );
        assert_eq!(
            resolve_location("feeds/catalog.xml").unwrap(),
            CatalogLocation::File(PathBuf::from("feeds/catalog.xml"))
        );
        assert_eq!(
            resolve_location("file:///tmp/feed.xml").unwrap(),
            CatalogLocation::File(PathBuf::from("/tmp/feed.xml"))
        );
        assert_eq!(
            resolve_location(" https://example.com/feed.xml ").unwrap(),
            CatalogLocation::Remote(Url::parse("https://example.com/feed.xml").unwrap())
        );
        assert!(matches!(
            resolve_location("ftp://example.com/feed.xml"),
            Err(FeedSyncError::Configuration { .. })
        ));
        assert!(resolve_location("  ").is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = XmlCatalog::load(
            "/nonexistent/feedsync/catalog.xml",
            TableRegistry::catalog_defaults(),
        )
        .await;
        assert!(matches!(result, Err(FeedSyncError::Io { .. })));
    }
}
