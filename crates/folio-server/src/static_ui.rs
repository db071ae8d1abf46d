use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};
use tracing::warn;

/// Serves the built bundle and answers unknown paths with `index.html` so
/// client-side routes survive a reload.
pub fn spa_service(dir: &Path) -> ServeDir<ServeFile> {
    let index = dir.join("index.html");
    if !index.is_file() {
        warn!("No index.html under {:?}; unmatched routes will return 404", dir);
    }
    ServeDir::new(dir).fallback(ServeFile::new(index))
}

/// Status page served at `/` in development, where the bundle is served by
/// the frontend dev server instead.
pub const DEV_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Folio Market Gateway</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #101418;
            color: #d8dee9;
            max-width: 720px;
            margin: 40px auto;
            padding: 0 20px;
        }
        h1 { font-size: 1.6em; }
        .card {
            background: #1b2128;
            border-radius: 8px;
            padding: 16px 20px;
            margin-bottom: 16px;
        }
        .value { font-family: 'Courier New', monospace; font-size: 1.4em; }
        .fail { color: #e06c75; }
        code { color: #88c0d0; }
    </style>
</head>
<body>
    <h1>Folio Market Gateway</h1>
    <div class="card">
        <div><code>GET /api/vix</code></div>
        <div id="vix" class="value">…</div>
    </div>
    <div class="card">
        <div><code>GET /api/buffett-indicator</code></div>
        <div id="buffett" class="value">…</div>
    </div>
    <div class="card">
        <div><code>GET /api/health</code></div>
        <div id="health" class="value">…</div>
    </div>
    <script>
        async function show(id, path, render) {
            const el = document.getElementById(id);
            try {
                const data = await (await fetch(path)).json();
                if (data.success === false) {
                    el.className = 'value fail';
                    el.textContent = data.message;
                } else {
                    el.className = 'value';
                    el.textContent = render(data);
                }
            } catch (error) {
                el.className = 'value fail';
                el.textContent = 'fetch failed';
            }
        }

        function refresh() {
            show('vix', '/api/vix', d => `${d.vix} (${d.source})`);
            show('buffett', '/api/buffett-indicator', d => `${d.buffettIndicator}% · ratio ${d.investmentRatio}`);
            show('health', '/api/health', d => `${d.status} · up ${d.uptimeSeconds}s`);
        }

        refresh();
        setInterval(refresh, 60 * 60 * 1000);
    </script>
</body>
</html>
"#;
