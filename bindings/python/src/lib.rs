// PyO3 bindings for accesslog_core
use once_cell::sync::Lazy;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule, PyString};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accesslog_core as core;

use core::{AccessLogRow, Format, FORMAT_CACHE};

// Parallel iterators for batch parsing
use rayon::prelude::*;

const EXCERPT_LEN: usize = 256;

// Format selected with set_format(); None means "resolve the default".
static ACTIVE_FORMAT: Lazy<RwLock<Option<Arc<Format>>>> = Lazy::new(|| RwLock::new(None));

fn to_py_err(e: core::Error) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// Reload the cached config if `config_path` is new or changed on disk. A reload
// drops the active selection, which may point into the replaced config.
fn refresh_config(config_path: &str) -> core::Result<()> {
    if core::ensure_formats_loaded(config_path)? {
        *ACTIVE_FORMAT.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
    Ok(())
}

fn active_format() -> PyResult<Arc<Format>> {
    let guard = ACTIVE_FORMAT.read().unwrap_or_else(PoisonError::into_inner);
    match guard.as_ref() {
        Some(f) => Ok(f.clone()),
        None => core::resolve_format(None).map_err(to_py_err),
    }
}

fn excerpt(line: &str) -> &str {
    let mut end = std::cmp::min(EXCERPT_LEN, line.len());
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

fn fill_dict<'py>(
    py: Python<'py>,
    format: &Format,
    values: &[Option<&str>],
) -> PyResult<Bound<'py, PyDict>> {
    let d = PyDict::new(py);
    for (name, value) in format.fields().iter().zip(values) {
        let key = PyString::intern(py, name);
        match value {
            Some(v) => d.set_item(key, *v)?,
            None => d.set_item(key, py.None())?,
        }
    }
    Ok(d)
}

fn parse_line_to_dict<'py>(
    py: Python<'py>,
    line: &str,
    format: &Format,
) -> PyResult<Option<Bound<'py, PyDict>>> {
    // Collect values in field order and populate the dict directly; no
    // intermediate HashMap or key cloning per line.
    let mut values: Vec<Option<&str>> = Vec::with_capacity(format.fields().len());
    if !format.pattern().apply_with(line, |_, v| values.push(v)) {
        return Ok(None);
    }
    fill_dict(py, format, &values).map(Some)
}

fn row_to_dict<'py>(py: Python<'py>, row: &AccessLogRow) -> PyResult<Bound<'py, PyDict>> {
    let d = PyDict::new(py);
    d.set_item("columns", row.columns.clone())?;
    d.set_item("tp_source_ip", row.tp_source_ip.clone())?;
    d.set_item("tp_ips", row.tp_ips.clone())?;
    d.set_item("tp_usernames", row.tp_usernames.clone())?;
    Ok(d)
}

fn format_to_dict<'py>(py: Python<'py>, format: &Format, source: &str) -> PyResult<Bound<'py, PyDict>> {
    let d = PyDict::new(py);
    d.set_item("name", format.name())?;
    d.set_item("description", format.description())?;
    d.set_item("source", source)?;
    for (kind, text) in format.properties() {
        d.set_item("kind", kind)?;
        d.set_item(kind, text)?;
    }
    d.set_item("pattern", format.pattern().as_str())?;
    d.set_item("fields", format.fields().to_vec())?;
    Ok(d)
}

/// Compile a directive layout and return the resulting regex source.
/// Raises ValueError naming the first unsupported directive.
#[pyfunction]
#[pyo3(text_signature = "(layout)")]
fn compile_layout(layout: &str) -> PyResult<String> {
    core::compile_layout(layout).map_err(to_py_err)
}

/// List the built-in presets and any formats loaded from a config file.
#[pyfunction]
#[pyo3(text_signature = "()")]
fn list_formats(py: Python) -> PyResult<Vec<Py<PyDict>>> {
    let mut out = Vec::new();
    for f in core::presets() {
        out.push(format_to_dict(py, f, "preset")?.unbind());
    }
    let guard = FORMAT_CACHE.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(lf) = guard.as_ref() {
        for f in &lf.formats {
            out.push(format_to_dict(py, f, "config")?.unbind());
        }
    }
    Ok(out)
}

/// Load format definitions from a JSON file path. Returns True on success.
/// Raises ValueError if the file cannot be read, parsed or compiled.
#[pyfunction]
#[pyo3(text_signature = "(config_path)")]
fn load_formats(config_path: &str) -> PyResult<bool> {
    let loaded = core::load_formats_internal(config_path).map_err(to_py_err)?;
    {
        let mut guard = FORMAT_CACHE.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(loaded);
    }
    // the previous selection may belong to the replaced config
    *ACTIVE_FORMAT.write().unwrap_or_else(PoisonError::into_inner) = None;
    Ok(true)
}

/// Return format config status and metadata.
#[pyfunction]
#[pyo3(text_signature = "()")]
fn get_formats_status(py: Python) -> PyResult<Py<PyDict>> {
    use std::time::SystemTime;
    let guard = FORMAT_CACHE.read().unwrap_or_else(PoisonError::into_inner);
    let d = PyDict::new(py);
    match guard.as_ref() {
        Some(lf) => {
            d.set_item("loaded", true)?;
            d.set_item("path", lf.path.clone())?;
            d.set_item("formats", lf.formats.len())?;
            d.set_item("default", lf.default.clone())?;
            let ms = lf
                .mtime
                .and_then(|mt| mt.duration_since(SystemTime::UNIX_EPOCH).ok())
                .map(|dur| (dur.as_secs() as i64) * 1000 + (dur.subsec_millis() as i64));
            d.set_item("mtime_epoch_ms", ms)?;
        }
        None => {
            d.set_item("loaded", false)?;
            d.set_item("path", py.None())?;
            d.set_item("formats", 0)?;
            d.set_item("default", py.None())?;
            d.set_item("mtime_epoch_ms", py.None())?;
        }
    }
    drop(guard);
    d.set_item("active", active_format()?.name())?;
    Ok(d.unbind())
}

/// Select the format used by parse_line() and friends. Returns True on success.
#[pyfunction]
#[pyo3(text_signature = "(name)")]
fn set_format(name: &str) -> PyResult<bool> {
    let format = core::resolve_format(Some(name)).map_err(to_py_err)?;
    tracing::debug!(name, "active format changed");
    *ACTIVE_FORMAT.write().unwrap_or_else(PoisonError::into_inner) = Some(format);
    Ok(true)
}

/// Parse a single log line with the active format.
/// Returns a dict of field -> value (None for fields absent from this line),
/// or None when the line does not match.
#[pyfunction]
#[pyo3(text_signature = "(line)")]
fn parse_line(py: Python, line: &str) -> PyResult<Option<Py<PyDict>>> {
    let format = active_format()?;
    Ok(parse_line_to_dict(py, line, &format)?.map(Bound::unbind))
}

/// Parse a single log line with the named format (preset or loaded config).
#[pyfunction]
#[pyo3(text_signature = "(line, name)")]
fn parse_line_with_format(py: Python, line: &str, name: &str) -> PyResult<Option<Py<PyDict>>> {
    let format = core::resolve_format(Some(name)).map_err(to_py_err)?;
    Ok(parse_line_to_dict(py, line, &format)?.map(Bound::unbind))
}

/// Parse a single log line against the config at `config_path`, reloading it
/// first when the file changed since it was cached. Without `name` the
/// config's default format is used.
#[pyfunction]
#[pyo3(signature = (line, config_path, name=None), text_signature = "(line, config_path, name=None)")]
fn parse_line_with_config(
    py: Python,
    line: &str,
    config_path: &str,
    name: Option<&str>,
) -> PyResult<Option<Py<PyDict>>> {
    refresh_config(config_path).map_err(to_py_err)?;
    let format = core::resolve_format(name).map_err(to_py_err)?;
    Ok(parse_line_to_dict(py, line, &format)?.map(Bound::unbind))
}

/// Parse a line and return an enriched result with parsed fields, derived row
/// values, raw excerpt, hash64 and runtime; None when the line does not match.
#[pyfunction]
#[pyo3(text_signature = "(line)")]
fn parse_line_enriched(py: Python, line: &str) -> PyResult<Option<Py<PyDict>>> {
    let format = active_format()?;
    let t0 = Instant::now();
    let Some(fields) = format.apply(line) else {
        return Ok(None);
    };
    let row = AccessLogRow::from_fields(&fields);
    let runtime_ns = t0.elapsed().as_nanos();

    let parsed = PyDict::new(py);
    for name in format.fields() {
        let key = PyString::intern(py, name);
        parsed.set_item(key, fields.get(name).cloned().flatten())?;
    }
    let d = PyDict::new(py);
    d.set_item("parsed", parsed)?;
    d.set_item("row", row_to_dict(py, &row)?)?;
    d.set_item("raw_excerpt", excerpt(line))?;
    d.set_item("hash64", core::hash64_fnv1a(line.as_bytes()))?;
    d.set_item("runtime_ns", runtime_ns)?;
    Ok(Some(d.unbind()))
}

/// Parse a batch of lines in parallel with the active format.
/// Matching runs on the Rayon pool against one shared compiled pattern; Python
/// dicts are built afterwards. Non-matching lines yield None.
#[pyfunction]
#[pyo3(text_signature = "(lines)")]
fn parse_lines_batch(py: Python, lines: Vec<String>) -> PyResult<Vec<Option<Py<PyDict>>>> {
    let format = active_format()?;
    let n_fields = format.fields().len();

    let mids: Vec<Option<Vec<Option<&str>>>> = lines
        .par_iter()
        .map(|line| {
            let mut values = Vec::with_capacity(n_fields);
            let matched = format.pattern().apply_with(line, |_, v| values.push(v));
            matched.then_some(values)
        })
        .collect();

    let mut out: Vec<Option<Py<PyDict>>> = Vec::with_capacity(mids.len());
    for mid in mids {
        match mid {
            Some(values) => out.push(Some(fill_dict(py, &format, &values)?.unbind())),
            None => out.push(None),
        }
    }
    Ok(out)
}

#[derive(Serialize)]
struct NdjsonRecord<'a> {
    format: &'a str,
    row: AccessLogRow,
    raw_excerpt: &'a str,
    hash64: u64,
    runtime_ns: u64,
}

/// Parse every line of `input_path` with the active format and write one JSON
/// record per matching line to `output_path`. Returns the number written;
/// lines that do not match are skipped.
#[pyfunction]
#[pyo3(text_signature = "(input_path, output_path)")]
fn parse_file_to_ndjson(input_path: &str, output_path: &str) -> PyResult<usize> {
    use std::io::{BufRead, BufReader, BufWriter, Write};
    let format = active_format()?;

    let infile =
        std::fs::File::open(input_path).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let mut outfile =
        std::fs::File::create(output_path).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let reader = BufReader::new(infile);
    let mut writer = BufWriter::new(&mut outfile);

    let mut count: usize = 0;
    let mut skipped: usize = 0;
    for line_res in reader.lines() {
        let line = line_res.map_err(|e| PyValueError::new_err(e.to_string()))?;
        if line.is_empty() {
            continue;
        }
        let t0 = Instant::now();
        let Some(row) = core::parse_line_to_row(&line, &format) else {
            skipped += 1;
            continue;
        };
        let record = NdjsonRecord {
            format: format.name(),
            row,
            raw_excerpt: excerpt(&line),
            hash64: core::hash64_fnv1a(line.as_bytes()),
            runtime_ns: t0.elapsed().as_nanos() as u64,
        };
        serde_json::to_writer(&mut writer, &record)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        writer.write_all(b"\n").map_err(|e| PyValueError::new_err(e.to_string()))?;
        count += 1;
    }
    writer.flush().map_err(|e| PyValueError::new_err(e.to_string()))?;
    tracing::debug!(input_path, written = count, skipped, "ndjson export finished");
    Ok(count)
}

// Logging is opt-in: ACCESSLOG_LOG holds an EnvFilter directive. try_init keeps
// any subscriber the embedding process already installed.
fn init_logging() {
    if let Ok(filter) = std::env::var("ACCESSLOG_LOG") {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(filter))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }
}

#[pymodule]
#[pyo3(module = "accesslog_rs")]
fn accesslog_rs(_py: Python, m: &Bound<PyModule>) -> PyResult<()> {
    m.add(
        "__doc__",
        "High-performance web-server access log parsing.\n\n\
        Features:\n\
        - Apache-style layouts (%h %l %u %t \"%r\" %>s %b ...) compiled to regex\n\
        - Built-in common / combined presets and a fallback that matches both\n\
        - Fast Rust core with Python bindings\n\n\
        Quick start:\n\
        >>> import accesslog_rs as al\n\
        >>> al.set_format('combined')\n\
        >>> fields = al.parse_line('127.0.0.1 - - [24/Feb/2025:12:34:56 +0000] \"GET / HTTP/1.1\" 200 512 \"-\" \"curl/8.0\"')\n\
        >>> print(fields['status'])",
    )?;

    init_logging();

    // Layout compilation and format management
    m.add_function(wrap_pyfunction!(compile_layout, m)?)?;
    m.add_function(wrap_pyfunction!(list_formats, m)?)?;
    m.add_function(wrap_pyfunction!(load_formats, m)?)?;
    m.add_function(wrap_pyfunction!(get_formats_status, m)?)?;
    m.add_function(wrap_pyfunction!(set_format, m)?)?;

    // Line parsing APIs
    m.add_function(wrap_pyfunction!(parse_line, m)?)?;
    m.add_function(wrap_pyfunction!(parse_line_with_format, m)?)?;
    m.add_function(wrap_pyfunction!(parse_line_with_config, m)?)?;
    m.add_function(wrap_pyfunction!(parse_line_enriched, m)?)?;
    m.add_function(wrap_pyfunction!(parse_lines_batch, m)?)?;
    m.add_function(wrap_pyfunction!(parse_file_to_ndjson, m)?)?;

    // Optional: preload formats and pick the active one from env vars.
    if let Ok(path) = std::env::var("ACCESSLOG_FORMATS_CONFIG") {
        if let Err(e) = refresh_config(&path) {
            tracing::warn!(path = %path, error = %e, "could not preload format config");
        }
    }
    if let Ok(name) = std::env::var("ACCESSLOG_FORMAT") {
        match core::resolve_format(Some(&name)) {
            Ok(format) => {
                *ACTIVE_FORMAT.write().unwrap_or_else(PoisonError::into_inner) = Some(format);
            }
            Err(e) => tracing::warn!(name = %name, error = %e, "could not activate format"),
        }
    }

    Ok(())
}
