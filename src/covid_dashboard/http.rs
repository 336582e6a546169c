// covid_dashboard - Interactive COVID-19 situation report dashboard
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::derive;
use crate::metrics::DashboardMetrics;
use crate::report::Figure;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const OPENMETRICS_FORMAT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";
const OTHER_REGION: &str = "other";

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<script src="https://cdn.plot.ly/plotly-2.27.0.min.js"></script>
</head>
<body>
<h2 style="text-align: center">{{title}}</h2>
<div><div id="graph1"></div></div>
<div style="width: 60%"><select id="state-picker">
{{options}}</select></div>
<script>
const picker = document.getElementById("state-picker");
function draw() {
  fetch("/figure?region=" + encodeURIComponent(picker.value))
    .then(function (res) {
      if (!res.ok) { throw new Error(res.status + " " + res.statusText); }
      return res.json();
    })
    .then(function (fig) { Plotly.react("graph1", fig.data, fig.layout); })
    .catch(function (err) { console.error("unable to load figure", err); });
}
picker.addEventListener("change", draw);
draw();
</script>
</body>
</html>
"#;

/// Static contents of the dashboard page.
#[derive(Debug, Clone)]
pub struct Page {
    pub title: String,
    /// Choices for the region selector, in display order
    pub regions: Vec<String>,
    pub default_region: String,
}

impl Page {
    /// Regions in selector order. A default region missing from the list is offered first so
    /// the initial selection still follows it.
    fn choices(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(self.regions.len() + 1);
        if !self.default_region.is_empty() && !self.regions.contains(&self.default_region) {
            out.push(&self.default_region);
        }

        out.extend(self.regions.iter().map(|r| r.as_str()));
        out
    }

    fn render(&self) -> String {
        let mut options = String::new();
        for region in self.choices() {
            let selected = if region == self.default_region { " selected" } else { "" };
            options.push_str(&format!(
                "<option value=\"{}\"{}>{}</option>\n",
                html_escape::encode_double_quoted_attribute(region),
                selected,
                html_escape::encode_text(region),
            ));
        }

        INDEX_TEMPLATE
            .replace("{{title}}", &html_escape::encode_text(&self.title))
            .replace("{{options}}", &options)
    }
}

/// Global state shared between all HTTP requests via `Arc`.
#[derive(Debug)]
pub struct RequestContext {
    data_dir: PathBuf,
    page: Page,
    registry: Registry,
    metrics: DashboardMetrics,
}

impl RequestContext {
    pub fn new<P: Into<PathBuf>>(data_dir: P, page: Page, registry: Registry, metrics: DashboardMetrics) -> Self {
        Self {
            data_dir: data_dir.into(),
            page,
            registry,
            metrics,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FigureParams {
    region: Option<String>,
}

/// Router for the dashboard page, the figure endpoint it loads, and our own metrics.
pub fn app(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/figure", get(figure))
        .route("/metrics", get(text_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn index(State(context): State<Arc<RequestContext>>) -> Html<String> {
    Html(context.page.render())
}

async fn figure(
    State(context): State<Arc<RequestContext>>,
    Query(params): Query<FigureParams>,
) -> Result<Json<Figure>, StatusCode> {
    let region = params.region.unwrap_or_else(|| context.page.default_region.clone());
    let data_dir = context.data_dir.clone();
    let selected = region.clone();

    // Every selection reloads all three series from disk which is slow enough to keep
    // off the async worker threads.
    match tokio::task::spawn_blocking(move || derive::load_region(&data_dir, &selected)).await {
        Ok(Ok(series)) => {
            let label = if context.page.regions.contains(&region) {
                region.as_str()
            } else {
                OTHER_REGION
            };

            context.metrics.rendered(label);
            tracing::debug!(message = "rendered situation report", region = %region, rows = series.rows.len());
            Ok(Json(Figure::situation_report(&series)))
        }
        Ok(Err(e)) => {
            context.metrics.render_failed();
            tracing::error!(message = "unable to derive region metrics", region = %region, error = %e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            context.metrics.render_failed();
            tracing::error!(message = "region metrics task failed", region = %region, error = %e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    let mut buf = String::new();

    match encode(&mut buf, &context.registry) {
        Ok(_) => {
            tracing::debug!(message = "encoded prometheus metrics to text format", num_bytes = buf.len());
            ([(CONTENT_TYPE, OPENMETRICS_FORMAT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
