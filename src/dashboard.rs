use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::gas::Gas;
use crate::grid::{sample_points, Spacing};
use crate::medium::Medium;
use crate::repository::GasRepository;
use crate::sweep::{Axis, FixedValues, SweepRequest};

const MAX_SAMPLES: usize = 2_000;

/// Shared server state. Each loaded gas sits behind its own mutex, so two
/// requests never sweep the same medium at once.
pub struct AppState {
    engine: Engine,
    repository: GasRepository,
    settings: Settings,
    media: Mutex<HashMap<String, Arc<Mutex<Gas>>>>,
}

impl AppState {
    pub fn new(engine: Engine, settings: Settings) -> Self {
        let repository = GasRepository::new(settings.gas_dir.clone(), settings.remote_url.clone());
        AppState {
            engine,
            repository,
            settings,
            media: Mutex::new(HashMap::new()),
        }
    }

    fn local_gas_path(&self, name: &str) -> Result<PathBuf> {
        self.repository
            .list_local_files()?
            .into_iter()
            .find(|p| p.file_name().and_then(|f| f.to_str()) == Some(name))
            .ok_or_else(|| Error::InvalidInput(format!("unknown gas '{name}'")))
    }

    /// Cached medium for `name`, loading it on first use. Touches the file
    /// system, so call it from a blocking task.
    fn medium(&self, name: &str) -> Result<Arc<Mutex<Gas>>> {
        let mut media = self
            .media
            .lock()
            .map_err(|_| Error::EngineFailure("media cache poisoned".into()))?;
        if let Some(gas) = media.get(name) {
            return Ok(gas.clone());
        }
        let path = self.local_gas_path(name)?;
        let gas = Arc::new(Mutex::new(self.engine.load_gas(&path)?));
        media.insert(name.to_string(), gas.clone());
        Ok(gas)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SweepQuery {
    /// Comma separated gas file names.
    pub gases: Option<String>,
    pub axis: Option<String>,
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub count: Option<usize>,
    pub spacing: Option<String>,
    pub field: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CurveOut {
    pub gas: String,
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub axis: Axis,
    pub x_label: String,
    pub y_label: String,
    pub fixed: FixedValues,
    pub curves: Vec<CurveOut>,
}

#[derive(Debug, Serialize)]
pub struct GasEntry {
    pub name: String,
    pub path: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            warn!("request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/gases", get(gases))
        .route("/api/sweep", get(sweep))
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn gases(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<Vec<GasEntry>>, ApiError> {
    let entries = tokio::task::spawn_blocking(move || list_gases(&state))
        .await
        .map_err(|e| Error::EngineFailure(format!("listing task failed: {e}")))??;
    Ok(Json(entries))
}

async fn sweep(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SweepQuery>,
) -> std::result::Result<Json<SweepResponse>, ApiError> {
    Ok(Json(run_sweep(state, q).await?))
}

pub fn list_gases(state: &AppState) -> Result<Vec<GasEntry>> {
    Ok(state
        .repository
        .list_local_files()?
        .into_iter()
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            Some(GasEntry {
                name,
                path: p.display().to_string(),
            })
        })
        .collect())
}

/// Resolve a dashboard query against the configured defaults and sweep
/// every selected gas.
pub async fn run_sweep(state: Arc<AppState>, q: SweepQuery) -> Result<SweepResponse> {
    let d = &state.settings.defaults;
    let axis = match q.axis.as_deref() {
        Some(s) => s.parse()?,
        None => d.axis,
    };
    let spacing = match q.spacing.as_deref() {
        Some(s) => s.parse()?,
        None if q.axis.is_none() => d.spacing,
        None => Spacing::Linear,
    };
    let (default_start, default_stop) = default_range(axis, &state.settings);
    let start = q.start.unwrap_or(default_start);
    let stop = q.stop.unwrap_or(default_stop);
    let count = q.count.unwrap_or(d.count).clamp(1, MAX_SAMPLES);
    let values = sample_points(start, stop, count, spacing)?;

    let fixed = FixedValues {
        electric_field: Some(q.field.unwrap_or(d.electric_field)),
        pressure: Some(q.pressure.unwrap_or(d.pressure)),
        temperature: Some(q.temperature.unwrap_or(d.temperature)),
    };

    let names: Vec<String> = q
        .gases
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(Error::InvalidInput("no gas selected".into()));
    }

    let mut curves = Vec::with_capacity(names.len());
    for name in names {
        let request = SweepRequest::new(axis, values.clone()).fixed(fixed);
        debug!("sweeping {name} along {axis}, {count} samples");
        let task_state = state.clone();
        let task_name = name.clone();
        let (label, curve) = tokio::task::spawn_blocking(move || -> Result<_> {
            let medium = task_state.medium(&task_name)?;
            let mut gas = medium
                .lock()
                .map_err(|_| Error::EngineFailure("medium lock poisoned".into()))?;
            let curve = request.run(&mut *gas)?;
            Ok((gas.name().to_string(), curve))
        })
        .await
        .map_err(|e| Error::EngineFailure(format!("sweep task failed: {e}")))??;

        curves.push(CurveOut {
            gas: name,
            label,
            x: curve.x,
            y: curve.y,
        });
    }

    Ok(SweepResponse {
        axis,
        x_label: axis.label(),
        y_label: "Drift velocity [cm/\u{b5}s]".to_string(),
        fixed,
        curves,
    })
}

/// Range used when the query gives no start/stop. The configured range
/// belongs to the configured axis; other axes get a range around the
/// configured fixed value.
fn default_range(axis: Axis, settings: &Settings) -> (f64, f64) {
    let d = &settings.defaults;
    if axis == d.axis {
        return (d.start, d.stop);
    }
    match axis {
        Axis::ElectricField => (10.0, 10_000.0),
        Axis::Pressure => (d.pressure * 0.1, d.pressure * 10.0),
        Axis::Temperature => (
            (d.temperature - 100.0).max(d.temperature * 0.5),
            d.temperature + 100.0,
        ),
    }
}

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>gasdrift</title>
    <style>
      body { font-family: sans-serif; margin: 0; display: flex; height: 100vh; }
      #panel { width: 280px; padding: 16px; background: #f4f4f4; overflow-y: auto; }
      #panel label { display: block; margin-top: 10px; font-size: 13px; }
      #panel input, #panel select { width: 100%; box-sizing: border-box; }
      #plot { flex: 1; padding: 16px; }
      #error { color: #b00020; margin-top: 12px; font-size: 13px; white-space: pre-wrap; }
      svg text { font-size: 12px; }
    </style>
  </head>
  <body>
    <div id="panel">
      <h3>Drift velocity</h3>
      <label>Gases <select id="gases" multiple size="6"></select></label>
      <label>Axis
        <select id="axis">
          <option value="field">Electric field</option>
          <option value="pressure">Pressure</option>
          <option value="temperature">Temperature</option>
        </select>
      </label>
      <label>Start <input id="start" type="number" step="any" /></label>
      <label>Stop <input id="stop" type="number" step="any" /></label>
      <label>Samples <input id="count" type="number" value="50" min="1" /></label>
      <label>Spacing
        <select id="spacing"><option value="log">log</option><option value="linear">linear</option></select>
      </label>
      <label>Electric field [V/cm] <input id="field" type="number" step="any" value="1000" /></label>
      <label>Pressure [bar] <input id="pressure" type="number" step="any" value="1" /></label>
      <label>Temperature [K] <input id="temperature" type="number" step="any" value="293.15" /></label>
      <p><button id="run">Plot</button></p>
      <div id="error"></div>
    </div>
    <div id="plot"><svg id="svg" width="100%" height="100%"></svg></div>
    <script>
      const $ = (id) => document.getElementById(id);
      const colors = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b"];

      async function loadGases() {
        const res = await fetch("/api/gases");
        const list = await res.json();
        if (!res.ok) { $("error").textContent = list.error; return; }
        for (const g of list) {
          const opt = document.createElement("option");
          opt.value = g.name; opt.textContent = g.name;
          $("gases").appendChild(opt);
        }
        if ($("gases").options.length) $("gases").options[0].selected = true;
      }

      function query() {
        const p = new URLSearchParams();
        const gases = [...$("gases").selectedOptions].map((o) => o.value);
        p.set("gases", gases.join(","));
        for (const k of ["axis", "spacing", "count", "field", "pressure", "temperature", "start", "stop"]) {
          if ($(k).value !== "") p.set(k, $(k).value);
        }
        return p;
      }

      function draw(data) {
        const svg = $("svg");
        svg.innerHTML = "";
        const w = svg.clientWidth, h = svg.clientHeight, m = 60;
        const xs = data.curves.flatMap((c) => c.x), ys = data.curves.flatMap((c) => c.y);
        if (!xs.length) return;
        const logx = $("spacing").value === "log";
        const fx = logx ? Math.log10 : (v) => v;
        const x0 = fx(Math.min(...xs)), x1 = fx(Math.max(...xs));
        const y0 = Math.min(0, ...ys), y1 = Math.max(...ys);
        const sx = (v) => m + ((fx(v) - x0) / (x1 - x0 || 1)) * (w - 2 * m);
        const sy = (v) => h - m - ((v - y0) / (y1 - y0 || 1)) * (h - 2 * m);
        const ns = "http://www.w3.org/2000/svg";
        const add = (tag, attrs, text) => {
          const el = document.createElementNS(ns, tag);
          for (const [k, v] of Object.entries(attrs)) el.setAttribute(k, v);
          if (text) el.textContent = text;
          svg.appendChild(el);
        };
        add("line", { x1: m, y1: h - m, x2: w - m, y2: h - m, stroke: "#333" });
        add("line", { x1: m, y1: m, x2: m, y2: h - m, stroke: "#333" });
        add("text", { x: w / 2, y: h - 15, "text-anchor": "middle" }, data.x_label);
        add("text", { x: 15, y: h / 2, transform: `rotate(-90 15 ${h / 2})`, "text-anchor": "middle" }, data.y_label);
        for (let i = 0; i <= 4; i++) {
          const yv = y0 + ((y1 - y0) * i) / 4;
          add("text", { x: m - 6, y: sy(yv) + 4, "text-anchor": "end" }, yv.toPrecision(3));
          const xv = logx ? Math.pow(10, x0 + ((x1 - x0) * i) / 4) : x0 + ((x1 - x0) * i) / 4;
          add("text", { x: sx(xv), y: h - m + 16, "text-anchor": "middle" }, xv.toPrecision(3));
        }
        data.curves.forEach((c, i) => {
          const d = c.x.map((x, j) => `${j ? "L" : "M"}${sx(x)},${sy(c.y[j])}`).join(" ");
          const color = colors[i % colors.length];
          add("path", { d, fill: "none", stroke: color, "stroke-width": 2 });
          add("text", { x: w - m, y: m + 16 * i, "text-anchor": "end", fill: color }, c.label);
        });
      }

      async function run() {
        $("error").textContent = "";
        const res = await fetch("/api/sweep?" + query());
        const body = await res.json();
        if (!res.ok) { $("error").textContent = body.error; return; }
        draw(body);
      }

      $("axis").addEventListener("change", () => {
        $("start").value = ""; $("stop").value = "";
        $("spacing").value = $("axis").value === "field" ? "log" : "linear";
      });
      $("run").addEventListener("click", run);
      loadGases().then(run);
    </script>
  </body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::engine_lock;
    use crate::engine::EngineConfig;
    use std::fs;

    const GAS: &str = "\
 Identifier: Test mix
 Dimension : F         3         1         1         0         0
 E fields
 1.00000000E-01 1.00000000E+00 1.00000000E+01
 The gas tables follow:
 5.00000000E-01 3.00000000E+00 4.00000000E+00
 H Extr:    0    0
 PGAS  = 7.60000000E+02, TGAS  = 2.93150000E+02
";

    fn state(dir: &std::path::Path) -> Arc<AppState> {
        fs::write(dir.join("mix.gas"), GAS).unwrap();
        let settings = Settings {
            gas_dir: dir.to_path_buf(),
            ..Settings::default()
        };
        let engine = Engine::initialize(EngineConfig::default()).unwrap();
        Arc::new(AppState::new(engine, settings))
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_sweep_default_field_axis() {
        let _lock = engine_lock();
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let q = SweepQuery {
            gases: Some("mix.gas".into()),
            count: Some(5),
            ..SweepQuery::default()
        };
        let res = runtime().block_on(run_sweep(state.clone(), q)).unwrap();
        assert_eq!(res.axis, Axis::ElectricField);
        assert_eq!(res.curves.len(), 1);
        assert_eq!(res.curves[0].label, "Test mix");
        assert_eq!(res.curves[0].x.len(), 5);
        assert_eq!(res.curves[0].x[0], 10.0);

        let gas = state.medium("mix.gas").unwrap();
        let gas = gas.lock().unwrap();
        assert_eq!(gas.temperature(), 293.15);
    }

    #[test]
    fn test_unknown_gas_is_client_error() {
        let _lock = engine_lock();
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let q = SweepQuery {
            gases: Some("../secret.gas".into()),
            ..SweepQuery::default()
        };
        let err = runtime().block_on(run_sweep(state, q)).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_temperature_axis_range() {
        let _lock = engine_lock();
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let q = SweepQuery {
            gases: Some("mix.gas, mix.gas".into()),
            axis: Some("temperature".into()),
            count: Some(3),
            ..SweepQuery::default()
        };
        let res = runtime().block_on(run_sweep(state.clone(), q)).unwrap();
        assert_eq!(res.curves.len(), 2);
        let x = &res.curves[0].x;
        assert_eq!(x.len(), 3);
        assert!((x[1] - 293.15).abs() < 1e-9);
        assert!(res.curves[0].y.iter().all(|v| *v > 0.0));
        assert_eq!(res.curves[0].y, res.curves[1].y);
        assert_eq!(list_gases(&state).unwrap()[0].name, "mix.gas");
    }

    fn error_response(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = runtime()
            .block_on(axum::body::to_bytes(response.into_body(), usize::MAX))
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_error_status_codes() {
        let (status, body) = error_response(Error::InvalidInput("no gas selected".into()).into());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid input: no gas selected");

        let (status, body) = error_response(Error::EngineFailure("diverged".into()).into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "engine failure: diverged");
    }

    #[test]
    fn test_unknown_gas_handler_returns_bad_request() {
        let _lock = engine_lock();
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let _app = router(state.clone());

        let q = SweepQuery {
            gases: Some("nope.gas".into()),
            ..SweepQuery::default()
        };
        let err = match runtime().block_on(sweep(State(state), Query(q))) {
            Ok(_) => panic!("sweep of an unknown gas succeeded"),
            Err(e) => e,
        };
        let (status, body) = error_response(err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("unknown gas 'nope.gas'"));
    }

    #[test]
    fn test_cold_default_temperature_range_stays_positive() {
        let mut settings = Settings::default();
        settings.defaults.temperature = 77.0;
        let (start, stop) = default_range(Axis::Temperature, &settings);
        assert!(start > 0.0);
        assert_eq!(stop, 177.0);
    }

    #[test]
    fn test_missing_selection() {
        let _lock = engine_lock();
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let err = runtime()
            .block_on(run_sweep(state, SweepQuery::default()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
