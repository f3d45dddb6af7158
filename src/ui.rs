use crate::models::DashboardResponse;

pub fn render_index(response: &DashboardResponse) -> String {
    let trees = response
        .view
        .as_ref()
        .map(|view| view.metrics.trees.to_string())
        .unwrap_or_else(|| "--".to_string());
    let status = response
        .error
        .as_deref()
        .map(|message| format!("Could not load the tree data: {message}"))
        .unwrap_or_default();

    INDEX_HTML
        .replace("{{SESSION}}", &escape_html(&response.session))
        .replace("{{TREES}}", &trees)
        .replace("{{STATUS}}", &escape_html(&status))
}

/// Minimal escaping for text placed inside HTML elements and attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Tree Label Inventory</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <style>
    :root {
      --ink: #2c3e50;
      --ink-soft: #34495e;
      --line: #e0e0e0;
      --muted: #7f8c8d;
      --accent: #2ca02c;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      background: #f4f6f7;
      color: var(--ink);
      font-family: "Segoe UI", "Helvetica Neue", sans-serif;
    }

    main {
      max-width: 1280px;
      margin: 0 auto;
      padding: 16px 20px 32px;
      display: grid;
      gap: 16px;
    }

    h1, h2 {
      margin: 0 0 12px;
      color: var(--ink);
    }

    .card {
      background: white;
      border: 1px solid var(--line);
      border-radius: 5px;
      padding: 16px;
      box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
    }

    .row {
      display: grid;
      grid-template-columns: 2fr 1fr;
      gap: 16px;
    }

    .row.charts {
      grid-template-columns: 1fr 1fr;
    }

    #map {
      height: 500px;
      border-radius: 4px;
    }

    .metric .label {
      font-size: 0.9rem;
      color: var(--muted);
    }

    .metric .value {
      font-size: 2rem;
      font-weight: 600;
    }

    .metric .value.small {
      font-size: 1.2rem;
    }

    .table-wrap {
      max-height: 350px;
      overflow-y: auto;
      font-size: 0.8rem;
    }

    table {
      width: 100%;
      border-collapse: collapse;
    }

    th, td {
      text-align: left;
      padding: 4px 6px;
      border-bottom: 1px solid var(--line);
    }

    th {
      position: sticky;
      top: 0;
      background: white;
    }

    button {
      color: white;
      background: var(--ink);
      border: none;
      border-radius: 4px;
      padding: 0.5rem 1rem;
      cursor: pointer;
    }

    button:hover {
      background: var(--ink-soft);
    }

    select {
      width: 100%;
      min-height: 80px;
    }

    .chart {
      width: 100%;
      display: block;
    }

    .chart text {
      font-size: 11px;
      fill: #555;
    }

    .chart .bar {
      cursor: pointer;
    }

    .chart .bar.selected {
      stroke: var(--ink);
      stroke-width: 2;
    }

    .chart .point {
      fill: var(--accent);
      cursor: pointer;
    }

    .chart .point.selected {
      stroke: var(--ink);
      stroke-width: 3;
    }

    .chart .line {
      fill: none;
      stroke: var(--accent);
      stroke-width: 2;
    }

    .chart .axis {
      stroke: #ccc;
    }

    .status {
      min-height: 1.2em;
      color: #c0392b;
      white-space: pre-wrap;
    }

    @media (max-width: 900px) {
      .row, .row.charts {
        grid-template-columns: 1fr;
      }
    }
  </style>
</head>
<body>
  <main data-session="{{SESSION}}">
    <h1>Tree Label Inventory Dashboard</h1>
    <div class="status" id="status">{{STATUS}}</div>

    <form method="post" action="/reset?session={{SESSION}}" class="reset-form">
      <button type="submit">Reset filters</button>
    </form>

    <section class="row">
      <div class="card">
        <h2>Map of labelled trees</h2>
        <div id="map"></div>
      </div>
      <div class="card">
        <div class="metric">
          <div class="label">Total labelled trees</div>
          <div class="value" id="metric-trees">{{TREES}}</div>
        </div>
        <div class="metric">
          <div class="label">Labels</div>
          <div class="value small" id="metric-labels">--</div>
        </div>
        <h2>Grid cells</h2>
        <select id="grid-select" multiple></select>
        <h2>Labelled trees</h2>
        <div class="table-wrap">
          <table>
            <thead>
              <tr><th>Label</th><th>Grid cell</th><th>Date</th><th>Operator</th></tr>
            </thead>
            <tbody id="table-body"></tbody>
          </table>
        </div>
      </div>
    </section>

    <h2>Data analysis</h2>
    <section class="row charts">
      <div class="card">
        <h2 id="grid-title"></h2>
        <svg id="grid-chart" class="chart" viewBox="0 0 600 400" role="img"></svg>
      </div>
      <div class="card">
        <h2 id="date-title"></h2>
        <svg id="date-chart" class="chart" viewBox="0 0 600 400" role="img"></svg>
      </div>
    </section>

    <form method="post" action="/reset?session={{SESSION}}" class="reset-form">
      <button type="submit">Reset filters</button>
    </form>
  </main>

  <script>
    const SVG_NS = 'http://www.w3.org/2000/svg';
    const statusEl = document.getElementById('status');
    const gridSelect = document.getElementById('grid-select');
    const tableBody = document.getElementById('table-body');

    const params = new URLSearchParams(window.location.search);
    const session = params.get('session') || sessionStorage.getItem('tree-session') ||
      Math.random().toString(36).slice(2, 14);
    sessionStorage.setItem('tree-session', session);
    if (params.get('session') !== session) {
      params.set('session', session);
      window.history.replaceState(null, '', `${window.location.pathname}?${params}`);
    }
    document.querySelectorAll('.reset-form').forEach((form) => {
      form.action = `/reset?session=${encodeURIComponent(session)}`;
    });

    let map = null;
    let markerLayer = null;
    let tileLayer = null;

    const setStatus = (message) => {
      statusEl.textContent = message || '';
    };

    const svgEl = (name, attrs) => {
      const el = document.createElementNS(SVG_NS, name);
      Object.entries(attrs || {}).forEach(([key, value]) => el.setAttribute(key, value));
      return el;
    };

    const svgText = (text, attrs) => {
      const el = svgEl('text', attrs);
      el.textContent = text;
      return el;
    };

    const layout = (spec) => {
      const width = 600;
      const height = spec.style.height;
      const padX = 50;
      const padTop = 30;
      const padBottom = 50;
      const max = Math.max(1, ...spec.points.map((point) => point.y));
      const scaleY = (height - padTop - padBottom) / (max * 1.15);
      return {
        width,
        height,
        padX,
        baseline: height - padBottom,
        y: (value) => height - padBottom - value * scaleY
      };
    };

    const emptyChart = (svg) => {
      svg.appendChild(svgText('No data', { x: '50%', y: '50%', 'text-anchor': 'middle' }));
    };

    const drawAxes = (svg, box, spec) => {
      svg.appendChild(svgEl('line', { class: 'axis', x1: box.padX, y1: box.baseline, x2: box.width - 10, y2: box.baseline }));
      svg.appendChild(svgText(spec.y_title, { x: 12, y: box.height / 2, transform: `rotate(-90 12 ${box.height / 2})`, 'text-anchor': 'middle' }));
      if (spec.x_title) {
        svg.appendChild(svgText(spec.x_title, { x: box.width / 2, y: box.height - 8, 'text-anchor': 'middle' }));
      }
    };

    const renderBarChart = (svg, spec, onClick) => {
      svg.replaceChildren();
      svg.setAttribute('viewBox', `0 0 600 ${spec.style.height}`);
      if (!spec.points.length) {
        emptyChart(svg);
        return;
      }
      const box = layout(spec);
      drawAxes(svg, box, spec);
      const slot = (box.width - box.padX - 10) / spec.points.length;
      spec.points.forEach((point, index) => {
        const x = box.padX + index * slot + slot * 0.15;
        const top = box.y(point.y);
        const bar = svgEl('rect', {
          class: spec.selected.includes(point.x) ? 'bar selected' : 'bar',
          x,
          y: top,
          width: slot * 0.7,
          height: box.baseline - top,
          fill: spec.style.colors[index % spec.style.colors.length]
        });
        bar.addEventListener('click', () => onClick(point.x));
        svg.appendChild(bar);
        if (spec.style.show_values) {
          svg.appendChild(svgText(point.y, { x: x + slot * 0.35, y: top - 6, 'text-anchor': 'middle' }));
        }
        svg.appendChild(svgText(point.x, { x: x + slot * 0.35, y: box.baseline + 16, 'text-anchor': 'middle' }));
      });
    };

    const renderLineChart = (svg, spec, onClick) => {
      svg.replaceChildren();
      svg.setAttribute('viewBox', `0 0 600 ${spec.style.height}`);
      if (!spec.points.length) {
        emptyChart(svg);
        return;
      }
      const box = layout(spec);
      drawAxes(svg, box, spec);
      const step = spec.points.length > 1 ? (box.width - box.padX - 30) / (spec.points.length - 1) : 0;
      const x = (index) => box.padX + 10 + index * step;
      const path = spec.points
        .map((point, index) => `${index === 0 ? 'M' : 'L'} ${x(index).toFixed(2)} ${box.y(point.y).toFixed(2)}`)
        .join(' ');
      svg.appendChild(svgEl('path', { class: 'line', d: path, stroke: spec.style.colors[0] }));
      const labelEvery = spec.points.length > 12 ? Math.ceil(spec.points.length / 12) : 1;
      spec.points.forEach((point, index) => {
        if (spec.style.show_markers) {
          const marker = svgEl('circle', {
            class: spec.selected.includes(point.x) ? 'point selected' : 'point',
            cx: x(index),
            cy: box.y(point.y),
            r: spec.style.marker_size / 2 + 1
          });
          marker.addEventListener('click', () => onClick(point.x));
          svg.appendChild(marker);
        }
        if (spec.style.show_values) {
          svg.appendChild(svgText(point.y, { x: x(index), y: box.y(point.y) - 10, 'text-anchor': 'middle' }));
        }
        if (index % labelEvery === 0) {
          svg.appendChild(svgText(point.x, { x: x(index), y: box.baseline + 16, 'text-anchor': 'middle' }));
        }
      });
    };

    const tooltipNode = (text) => {
      const node = document.createElement('span');
      node.textContent = text;
      return node;
    };

    const popupNode = (text) => {
      const node = document.createElement('div');
      text.split('\n').forEach((line) => {
        const div = document.createElement('div');
        div.textContent = line;
        node.appendChild(div);
      });
      return node;
    };

    const renderMap = (spec) => {
      if (typeof L === 'undefined') {
        document.getElementById('map').textContent = `${spec.markers.length} trees (map library unavailable)`;
        return;
      }
      if (!map) {
        map = L.map('map');
        markerLayer = L.layerGroup().addTo(map);
      }
      if (tileLayer) {
        tileLayer.remove();
      }
      tileLayer = L.tileLayer(spec.tiles || 'https://tile.openstreetmap.org/{z}/{x}/{y}.png', {
        attribution: spec.attribution || 'OpenStreetMap'
      }).addTo(map);
      map.setView(spec.center, spec.zoom);
      markerLayer.clearLayers();
      const style = spec.marker_style;
      spec.markers.forEach((marker) => {
        L.circleMarker([marker.lat, marker.lon], {
          radius: style.radius,
          color: style.color,
          fill: true,
          fillColor: style.fill_color,
          fillOpacity: style.fill_opacity
        })
          .bindTooltip(tooltipNode(marker.tooltip))
          .bindPopup(popupNode(marker.popup))
          .addTo(markerLayer);
      });
    };

    const renderTable = (rows) => {
      tableBody.replaceChildren();
      rows.forEach((row) => {
        const tr = document.createElement('tr');
        [row.label_name, row.grid_cell, row.date || '', row.operator].forEach((value) => {
          const td = document.createElement('td');
          td.textContent = value;
          tr.appendChild(td);
        });
        tableBody.appendChild(tr);
      });
    };

    const renderGridSelect = (options, selected) => {
      gridSelect.replaceChildren();
      options.forEach((value) => {
        const option = document.createElement('option');
        option.value = value;
        option.textContent = value;
        option.selected = selected.includes(value);
        gridSelect.appendChild(option);
      });
    };

    const render = (data) => {
      if (data.error || !data.view) {
        setStatus(`Could not load the tree data: ${data.error || 'no data'}`);
        return;
      }
      setStatus('');
      const view = data.view;
      document.getElementById('metric-trees').textContent = view.metrics.trees;
      document.getElementById('metric-labels').textContent = view.metrics.labels;
      document.getElementById('grid-title').textContent = view.grid_chart.title;
      document.getElementById('date-title').textContent = view.date_chart.title;
      renderGridSelect(view.grid_options, data.selection.grid_cells);
      renderTable(view.table);
      renderBarChart(document.getElementById('grid-chart'), view.grid_chart, (x) =>
        send({ type: 'click_grid_bar', points: [{ x }] }).catch((err) => setStatus(err.message)));
      renderLineChart(document.getElementById('date-chart'), view.date_chart, (x) =>
        send({ type: 'click_date_point', points: [{ x }] }).catch((err) => setStatus(err.message)));
      renderMap(view.map);
    };

    const query = () => `session=${encodeURIComponent(session)}`;

    const load = async () => {
      const res = await fetch(`/api/dashboard?${query()}`);
      if (!res.ok) {
        throw new Error(await res.text() || 'Unable to load dashboard');
      }
      render(await res.json());
    };

    const send = async (interaction) => {
      const res = await fetch(`/api/interaction?${query()}`, {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify(interaction)
      });
      if (!res.ok) {
        throw new Error(await res.text() || 'Request failed');
      }
      render(await res.json());
    };

    gridSelect.addEventListener('change', () => {
      const cells = Array.from(gridSelect.selectedOptions).map((option) => option.value);
      send({ type: 'select_grid_cells', cells }).catch((err) => setStatus(err.message));
    });

    document.querySelectorAll('.reset-form').forEach((form) => {
      form.addEventListener('submit', (event) => {
        event.preventDefault();
        send({ type: 'reset' }).catch((err) => setStatus(err.message));
      });
    });

    load().catch((err) => setStatus(err.message));
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterSelection;

    #[test]
    fn error_page_escapes_diagnostic() {
        let response = DashboardResponse {
            session: "default".to_string(),
            selection: FilterSelection::default(),
            error: Some("first bytes: \"<b>x</b>\"".to_string()),
            view: None,
        };
        let page = render_index(&response);
        assert!(page.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(!page.contains("<b>x</b>"));
        assert!(page.contains(r#"id="metric-trees">--<"#));
    }

    #[test]
    fn marker_text_is_never_handed_to_leaflet_as_html() {
        assert!(INDEX_HTML.contains(".bindTooltip(tooltipNode(marker.tooltip))"));
        assert!(INDEX_HTML.contains(".bindPopup(popupNode(marker.popup))"));
        assert!(!INDEX_HTML.contains(".bindTooltip(marker."));
        assert!(!INDEX_HTML.contains(".bindPopup(marker."));
    }
}
