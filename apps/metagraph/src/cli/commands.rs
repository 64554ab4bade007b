//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::AppConfig;
use metagraph_core::{
    ElementProperties, ElementQuery, ElementStatus, Guid, HistoryRequest, MemoryStore,
    MetadataClient, MetadataError, MetadataResult, MetadataStore, NewClassification, NewElement,
    OpenMetadataElement, Paging, PropertyValue, QueryOptions, StoreSnapshot,
    formats::{MAX_SNAPSHOT_SIZE, snapshot_checksum, snapshot_from_bytes, snapshot_to_bytes},
    primitives::QUALIFIED_NAME,
    save_snapshot,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// CONTEXT
// =============================================================================

/// Global flags and the loaded configuration.
#[derive(Debug)]
pub struct Context {
    pub database: PathBuf,
    pub user: String,
    pub json_mode: bool,
    pub config: AppConfig,
}

impl Context {
    fn open(&self) -> MetadataResult<(Arc<MemoryStore>, MetadataClient)> {
        let store = Arc::new(load_store(&self.config, &self.database)?);
        let shared: Arc<dyn MetadataStore> = store.clone();
        let client = MetadataClient::new(shared, self.config.client.clone());
        Ok((store, client))
    }

    fn save(&self, store: &MemoryStore) -> MetadataResult<()> {
        save_snapshot(store, &self.database)?;
        tracing::debug!(database = %self.database.display(), "Snapshot saved");
        Ok(())
    }

    /// JSON in `--json-mode`, otherwise whatever `human` prints.
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> MetadataResult<()> {
        if self.json_mode {
            let text = serde_json::to_string_pretty(value)
                .map_err(|e| MetadataError::Serialization(e.to_string()))?;
            println!("{}", text);
        } else {
            human();
        }
        Ok(())
    }
}

// =============================================================================
// FILE HELPERS
// =============================================================================

fn validate_file_size(path: &Path, max_size: u64) -> MetadataResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| MetadataError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(MetadataError::invalid(
            "file",
            format!(
                "size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                max_size
            ),
        ));
    }
    Ok(())
}

/// Resolve an input path: it must exist and be a regular file.
fn validate_file_path(path: &Path) -> MetadataResult<PathBuf> {
    let canonical = path.canonicalize().map_err(|e| {
        MetadataError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(MetadataError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: its parent directory must exist.
fn validate_output_path(path: &Path) -> MetadataResult<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        MetadataError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(MetadataError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| MetadataError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Open the snapshot at `database` with the configured access rules. A
/// missing file is an empty store.
pub fn load_store(config: &AppConfig, database: &Path) -> MetadataResult<MemoryStore> {
    if database.exists() {
        validate_file_size(database, MAX_SNAPSHOT_SIZE as u64)?;
    }
    config.open_store(database)
}

// =============================================================================
// ARGUMENT PARSING
// =============================================================================

fn parse_value(text: &str) -> PropertyValue {
    if let Ok(int) = text.parse::<i64>() {
        return PropertyValue::Int(int);
    }
    match text {
        "true" => PropertyValue::Boolean(true),
        "false" => PropertyValue::Boolean(false),
        _ => PropertyValue::string(text),
    }
}

/// Parse `name=value` pairs. Integers and `true`/`false` become typed
/// values; everything else is a string.
pub fn parse_properties(pairs: &[String]) -> MetadataResult<ElementProperties> {
    let mut properties = ElementProperties::new();
    for pair in pairs {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            MetadataError::invalid("property", format!("expected name=value, got '{}'", pair))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(MetadataError::invalid(
                "property",
                format!("missing name in '{}'", pair),
            ));
        }
        properties.insert(name, parse_value(value));
    }
    Ok(properties)
}

/// Parse a status name such as `active` or `UNDER_DEVELOPMENT`.
pub fn parse_status(text: &str) -> MetadataResult<ElementStatus> {
    let normalized = text.trim().to_uppercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| MetadataError::invalid("status", format!("unknown status '{}'", text)))
}

fn display_name(element: &OpenMetadataElement) -> &str {
    element
        .properties
        .get_str(QUALIFIED_NAME)
        .or_else(|| element.properties.get_str("displayName"))
        .unwrap_or("-")
}

fn print_elements(elements: &[OpenMetadataElement]) {
    if elements.is_empty() {
        println!("No elements found.");
        return;
    }
    for element in elements {
        println!(
            "{}  {:<24} {:<12} {}",
            element.guid,
            element.type_name,
            element.status.to_string(),
            display_name(element)
        );
    }
    println!("{} element(s)", elements.len());
}

fn print_element(element: &OpenMetadataElement) {
    println!("GUID:      {}", element.guid);
    println!("Type:      {}", element.type_name);
    println!("Status:    {}", element.status);
    println!("Version:   {}", element.header.version);
    println!("Created:   {} by {}", element.header.create_time, element.header.created_by);
    if let Some(anchor) = element.anchor_guid() {
        println!("Anchor:    {}", anchor);
    }
    if !element.properties.is_empty() {
        println!("Properties:");
        for (name, value) in element.properties.iter() {
            let text = value.as_text().unwrap_or_else(|| format!("{:?}", value));
            println!("  {} = {}", name, text);
        }
    }
    if !element.classifications.is_empty() {
        println!("Classifications:");
        for name in element.classifications.keys() {
            println!("  {}", name);
        }
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

pub async fn cmd_server(
    ctx: &Context,
    host: Option<String>,
    port: Option<u16>,
) -> MetadataResult<()> {
    let store = load_store(&ctx.config, &ctx.database)?;
    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);

    println!("metagraph server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Database: {}", ctx.database.display());
    println!("  Server:   {}", ctx.config.client.server_name);
    println!();
    println!("Press Ctrl+C to stop; the snapshot is written on shutdown.");
    println!();

    let state = AppState::new(store, ctx.config.client.clone());
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state, ctx.database.clone()).await
}

// =============================================================================
// STATUS / INIT
// =============================================================================

#[derive(Debug, Serialize)]
struct StatusReport {
    database: String,
    elements: usize,
    relationships: usize,
    correlations: usize,
    element_versions: usize,
    checksum: String,
}

pub fn cmd_status(ctx: &Context) -> MetadataResult<()> {
    let store = load_store(&ctx.config, &ctx.database)?;
    let stats = store.statistics()?;
    let bytes = snapshot_to_bytes(&store.snapshot())?;
    let report = StatusReport {
        database: ctx.database.display().to_string(),
        elements: stats.elements,
        relationships: stats.relationships,
        correlations: stats.correlations,
        element_versions: stats.element_versions,
        checksum: snapshot_checksum(&bytes),
    };

    ctx.emit(&report, || {
        println!("Store Status");
        println!("============");
        println!("Database:         {}", report.database);
        println!("Elements:         {}", report.elements);
        println!("Element versions: {}", report.element_versions);
        println!("Relationships:    {}", report.relationships);
        println!("Correlations:     {}", report.correlations);
        println!("BLAKE3:           {}", report.checksum);
    })
}

pub fn cmd_init(ctx: &Context, force: bool) -> MetadataResult<()> {
    if ctx.database.exists() && !force {
        return Err(MetadataError::invalid(
            "database",
            "already exists. Use --force to overwrite.",
        ));
    }
    save_snapshot(&MemoryStore::new(), &ctx.database)?;
    println!("Initialized empty store at {}", ctx.database.display());
    Ok(())
}

// =============================================================================
// ELEMENT COMMANDS
// =============================================================================

pub fn cmd_create(
    ctx: &Context,
    type_name: &str,
    properties: &[String],
    classifications: &[String],
    anchor: Option<&str>,
    status: Option<&str>,
) -> MetadataResult<()> {
    let mut element = NewElement::new(type_name).with_properties(parse_properties(properties)?);
    for name in classifications {
        element = element.with_classification(NewClassification::new(name.as_str()));
    }
    if let Some(anchor) = anchor {
        element = element.anchored_on(Guid::parse(anchor, "anchor")?);
    }
    if let Some(status) = status {
        element = element.with_status(parse_status(status)?);
    }

    let (store, client) = ctx.open()?;
    let guid = client.create_metadata_element_in_store(&ctx.user, &element)?;
    ctx.save(&store)?;

    ctx.emit(&guid, || println!("Created {} {}", type_name, guid))
}

pub fn cmd_get(ctx: &Context, guid: &str, lineage: bool) -> MetadataResult<()> {
    let guid = Guid::parse(guid, "guid")?;
    let options = QueryOptions {
        for_lineage: lineage,
        ..QueryOptions::default()
    };
    let (_, client) = ctx.open()?;
    let element = client.get_metadata_element_by_guid(&ctx.user, guid, &options)?;

    ctx.emit(&element, || match &element {
        Some(element) => print_element(element),
        None => println!("No visible element {}", guid),
    })
}

/// Arguments of `find`. At most one of `search`, `property` and
/// `classification` may be given.
#[derive(Debug, Default)]
pub struct FindArgs {
    pub search: Option<String>,
    pub type_name: Option<String>,
    pub property: Option<String>,
    pub classification: Option<String>,
    pub start: usize,
    pub page_size: usize,
    pub lineage: bool,
}

pub fn cmd_find(ctx: &Context, args: &FindArgs) -> MetadataResult<()> {
    let options = QueryOptions {
        for_lineage: args.lineage,
        ..QueryOptions::default()
    };
    let paging = Paging::new(args.start, args.page_size);
    let type_name = args.type_name.as_deref();
    let (_, client) = ctx.open()?;

    let elements = match (&args.search, &args.property, &args.classification) {
        (Some(search), None, None) => client.find_metadata_elements_with_string(
            &ctx.user, search, type_name, &options, paging,
        )?,
        (None, Some(pair), None) => {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                MetadataError::invalid("property", format!("expected name=value, got '{}'", pair))
            })?;
            client.find_metadata_elements_by_property_value(
                &ctx.user,
                type_name,
                &[name.trim()],
                value,
                &options,
                paging,
            )?
        }
        (None, None, Some(classification)) => client.find_metadata_elements_by_classification(
            &ctx.user,
            type_name,
            classification,
            &options,
            paging,
        )?,
        (None, None, None) => {
            let query = ElementQuery {
                type_name: args.type_name.clone(),
                ..ElementQuery::default()
            };
            client.find_metadata_elements(&ctx.user, &query, &options, paging)?
        }
        _ => {
            return Err(MetadataError::invalid(
                "find",
                "use at most one of --search, --property and --classification",
            ));
        }
    };

    ctx.emit(&elements, || print_elements(&elements))
}

pub fn cmd_classify(
    ctx: &Context,
    guid: &str,
    name: &str,
    properties: &[String],
) -> MetadataResult<()> {
    let guid = Guid::parse(guid, "guid")?;
    let classification = NewClassification::new(name).with_properties(parse_properties(properties)?);

    let (store, client) = ctx.open()?;
    client.classify_metadata_element_in_store(
        &ctx.user,
        guid,
        &classification,
        &QueryOptions::default(),
    )?;
    ctx.save(&store)?;

    ctx.emit(&guid, || println!("Classified {} as {}", guid, name))
}

pub fn cmd_history(
    ctx: &Context,
    guid: &str,
    oldest_first: bool,
    page_size: usize,
) -> MetadataResult<()> {
    let guid = Guid::parse(guid, "guid")?;
    let request = HistoryRequest {
        oldest_first,
        paging: Paging::new(0, page_size),
        ..HistoryRequest::default()
    };
    let (_, client) = ctx.open()?;
    let versions =
        client.get_metadata_element_history(&ctx.user, guid, &request, &QueryOptions::lineage())?;

    ctx.emit(&versions, || {
        for version in &versions {
            println!(
                "v{:<4} {}  {:<12} {}",
                version.header.version,
                version.header.version_time(),
                version.status.to_string(),
                version
                    .header
                    .updated_by
                    .as_deref()
                    .unwrap_or(&version.header.created_by)
            );
        }
    })
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

pub fn cmd_export(ctx: &Context, output: &Path, format: &str) -> MetadataResult<()> {
    let validated_output = validate_output_path(output)?;
    let store = load_store(&ctx.config, &ctx.database)?;
    let snapshot = store.snapshot();

    let data = match format {
        "snapshot" => snapshot_to_bytes(&snapshot)?,
        "json" => serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| MetadataError::Serialization(e.to_string()))?,
        _ => {
            return Err(MetadataError::invalid(
                "format",
                format!("unknown format: {}. Use: snapshot, json", format),
            ));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| MetadataError::Io(format!("Write file: {}", e)))?;

    println!(
        "Exported {} bytes to {}",
        data.len(),
        validated_output.display()
    );
    Ok(())
}

/// Decode either a binary snapshot or its JSON export.
fn decode_export(data: &[u8]) -> MetadataResult<StoreSnapshot> {
    match snapshot_from_bytes(data) {
        Ok(snapshot) => Ok(snapshot),
        Err(binary) => serde_json::from_slice::<StoreSnapshot>(data).map_err(|json| {
            MetadataError::Serialization(format!(
                "not a snapshot ({}) nor a JSON export ({})",
                binary, json
            ))
        }),
    }
}

pub fn cmd_import(ctx: &Context, input: &Path) -> MetadataResult<()> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_SNAPSHOT_SIZE as u64)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| MetadataError::Io(format!("Read file: {}", e)))?;

    let store = MemoryStore::from_snapshot(decode_export(&data)?)?;
    save_snapshot(&store, &ctx.database)?;

    let stats = store.statistics()?;
    println!(
        "Imported store: {} elements, {} relationships, {} correlations",
        stats.elements, stats.relationships, stats.correlations
    );
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
