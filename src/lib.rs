/*!
# Data Dashboard

A browser-based data dashboard built in Rust. Users upload a CSV or Excel file,
pick columns for the axes, narrow the rows with filters, and get line, bar and
scatter charts they can download as PNG images.

## Overview

Every interaction re-runs one pure pipeline: the session's table is filtered,
aggregated where a chart needs it, turned into chart descriptions, and handed
to the page as a single view model. Nothing in the pipeline touches global
state, so two users working at the same time never see each other's data.

## Architecture

### Frontend Layer
- **Technologies**: HTML, CSS, JavaScript
- **Key Components**:
  - Dataset switch - Sample sales data or the uploaded file
  - Axis and filter widgets - Re-render the view on every change
  - Chart panels - PNG images fetched from the download endpoint

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Table Loader - Parses CSV and XLSX bytes into a typed table
  - Filter/Aggregate - Accepted-value filters and group-by sums
  - Chart Renderer - Builds line, bar and scatter chart descriptions
  - Rasterizer - Draws a chart into an in-memory PNG with plotters
  - Session Store - One table per browser session, keyed by cookie

## Modules

- **table**: Typed column table and value formatting
- **loader**: CSV and XLSX parsing
- **filter**: Filter selection and group-by sums
- **metrics**: Summary figures shown above the charts
- **chart**: Chart kinds, specs and chart construction
- **graph**: PNG rasterization of charts
- **sample**: Built-in sales dataset
- **pipeline**: The `render` step producing a view model
- **session**: Per-user session state and the session store
- **downloader**: Export of the filtered table (CSV, XLSX)
- **config**: Server settings
- **app**: Routing and handlers (`web` feature)

## REST API Endpoints

- `GET /` - Dashboard page
- `GET /api/session` - Describes the table loaded in this session
- `POST /api/upload` - Multipart upload of a `.csv` or Excel file
- `POST /api/view` - Renders the view model for the current widget state
- `POST /api/download/{kind}` - PNG of the `line`, `bar` or `scatter` chart
- `POST /api/export/{format}` - Filtered rows as `csv` or `xlsx`
- `POST /api/reset` - Clears the session's table
*/

pub mod chart;
pub mod config;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod graph;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod sample;
pub mod session;
pub mod table;

#[cfg(feature = "web")]
pub mod app;

pub use error::{DashboardError, Result};
pub use pipeline::{AxisSelection, ViewModel, render};
pub use table::{Column, ColumnData, ColumnType, Table};
