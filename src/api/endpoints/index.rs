//! Upload form served at `/`.

use axum::response::Html;

/// `GET /`: minimal browser form posting to `/api/analyze`.
pub async fn page() -> Html<&'static str> {
    Html(INDEX_PAGE_HTML)
}

const INDEX_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>DocVision</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
    form { display: grid; gap: 0.75rem; padding: 1rem; border: 1px solid #ddd; border-radius: 6px; }
    pre { white-space: pre-wrap; background: #f6f6f6; padding: 0.75rem; border-radius: 4px; }
    .error { color: #b00020; }
  </style>
</head>
<body>
  <h1>DocVision</h1>
  <p>Upload a PDF or an image (PNG, JPG, GIF, BMP, TIFF) to extract its text, summarize it and score its sentiment.</p>
  <form id="upload">
    <input type="file" name="file" accept=".pdf,.png,.jpg,.jpeg,.gif,.bmp,.tiff,.tif" required>
    <label>Export as
      <select name="convert">
        <option value="none">No export</option>
        <option value="pdf">PDF</option>
        <option value="docx">DOCX</option>
      </select>
    </label>
    <button type="submit">Analyze</button>
  </form>
  <div id="result"></div>
  <script>
    const form = document.getElementById('upload');
    const out = document.getElementById('result');
    const esc = (s) => String(s).replace(/[&<>"]/g, (c) => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;'}[c]));
    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      out.innerHTML = '<p>Processing…</p>';
      const response = await fetch('/api/analyze', { method: 'POST', body: new FormData(form) });
      const body = await response.json();
      if (!response.ok) {
        out.innerHTML = '<p class="error">' + esc(body.error.message) + '</p>';
        return;
      }
      let html = '<h2>Sentiment</h2><p><strong>' + esc(body.sentiment) + '</strong></p>'
        + '<h2>Summary</h2><pre>' + esc(body.summary) + '</pre>'
        + '<h2>Extracted text</h2><pre>' + esc(body.extracted_text) + '</pre>';
      if (body.download_url) {
        html += '<p><a href="' + esc(body.download_url) + '">Download report</a></p>';
      } else if (body.export) {
        html += '<p class="error">Export failed.</p>';
      }
      out.innerHTML = html;
    });
  </script>
</body>
</html>
"#;
