extern crate image;
extern crate pretty_bytes;
extern crate reqwest;
extern crate std;
extern crate tiny_http;

use crate::config;
use crate::result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortalEvent {
    Nothing,
    SettingsChanged,
}

#[derive(Debug, PartialEq)]
struct Reply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    fn html(status: u16, body: String) -> Reply {
        return Reply {
            status: status,
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
        };
    }

    fn text(status: u16, body: String) -> Reply {
        return Reply {
            status: status,
            content_type: "text/plain; charset=utf-8",
            body: body.into_bytes(),
        };
    }

    fn not_found() -> Reply {
        return Reply::html(404, "<h1>404</h1><p>Not found!<p>".to_string());
    }
}

pub struct Portal {
    server: tiny_http::Server,
    log_dir: std::path::PathBuf,
}

impl Portal {
    pub fn start(port: u16, log_dir: &str) -> result::DashResult<Portal> {
        let server = tiny_http::Server::http(("0.0.0.0", port))
            .map_err(|err| result::make_error(&format!("Portal on port {}: {}", port, err)))?;

        info!("Running portal HTTP server on port {}", port);
        return Ok(Portal {
            server: server,
            log_dir: std::path::PathBuf::from(log_dir),
        });
    }

    /// Answers whatever requests are queued. Never blocks.
    pub fn process(&self, settings: &mut config::Settings, canvas: &image::RgbImage) -> PortalEvent {
        let mut event = PortalEvent::Nothing;
        loop {
            let request = match self.server.try_recv() {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(err) => {
                    warn!("Portal receive failed: {}", err);
                    break;
                }
            };

            let is_get = *request.method() == tiny_http::Method::Get;
            debug!("Portal {} {}", request.method(), request.url());
            let (reply, request_event) = route(is_get, request.url(), settings, canvas, &self.log_dir);
            if request_event == PortalEvent::SettingsChanged {
                event = request_event;
            }

            if let Err(err) = respond(request, reply) {
                warn!("Portal response failed: {}", err);
            }
        }
        return event;
    }
}

fn respond(request: tiny_http::Request, reply: Reply) -> result::DashResult<()> {
    let mut response = tiny_http::Response::from_data(reply.body)
        .with_status_code(reply.status);
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        Ok(header) => response.add_header(header),
        Err(_) => warn!("Bad content type {}", reply.content_type),
    }
    request.respond(response)?;
    return Ok(());
}

fn route(is_get: bool,
         url: &str,
         settings: &mut config::Settings,
         canvas: &image::RgbImage,
         log_dir: &std::path::Path) -> (Reply, PortalEvent) {
    if !is_get {
        return (Reply::not_found(), PortalEvent::Nothing);
    }

    let (path, params) = match split_url(url) {
        Some(parts) => parts,
        None => return (Reply::not_found(), PortalEvent::Nothing),
    };

    match path.as_str() {
        "/" => (main_page(settings, log_dir), PortalEvent::Nothing),
        "/save" => save_settings(settings, &params),
        "/current_image" => (current_image(canvas), PortalEvent::Nothing),
        "/dumplog" => (dump_log(&params, log_dir), PortalEvent::Nothing),
        _ => (Reply::not_found(), PortalEvent::Nothing),
    }
}

/// Path plus percent-decoded query pairs of a request target like "/save?station=1".
pub fn split_url(url: &str) -> Option<(String, Vec<(String, String)>)> {
    let parsed = reqwest::Url::parse(&format!("http://localhost{}", url)).ok()?;
    let params = parsed.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    return Some((parsed.path().to_string(), params));
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    return params.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str());
}

fn save_settings(settings: &mut config::Settings, params: &[(String, String)]) -> (Reply, PortalEvent) {
    let mut updated = settings.clone();

    if let Err(err) = apply_params(&mut updated, params) {
        warn!("Rejected portal settings: {}", err);
        return (Reply::html(400, format!("<html><body><h1>Ungültig</h1><p>{}</p><a href='/'>Zurück</a></body></html>",
                                         escape_html(&err.to_string()))),
                PortalEvent::Nothing);
    }

    if updated == *settings {
        return (Reply::html(200, saved_page(settings)), PortalEvent::Nothing);
    }

    info!("Portal settings: station {} -> {}, track {} -> {}",
          settings.station_id, updated.station_id,
          settings.describe_track(), updated.describe_track());
    *settings = updated;
    return (Reply::html(200, saved_page(settings)), PortalEvent::SettingsChanged);
}

fn apply_params(settings: &mut config::Settings, params: &[(String, String)]) -> result::DashResult<()> {
    if let Some(station) = param(params, "station") {
        settings.set_station(station)?;
    }
    if let Some(track) = param(params, "track") {
        settings.set_track(track)?;
    }
    return Ok(());
}

fn saved_page(settings: &config::Settings) -> String {
    return format!("<html><body><h1>Gespeichert</h1><p>Station {}, Gleis {}</p><a href='/'>Zurück</a></body></html>",
                   escape_html(&settings.station_id),
                   escape_html(settings.describe_track()));
}

fn current_image(canvas: &image::RgbImage) -> Reply {
    let mut bytes: Vec<u8> = Vec::new();
    let encoded = image::DynamicImage::ImageRgb8(canvas.clone())
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png);

    match encoded {
        Ok(_) => Reply {
            status: 200,
            content_type: "image/png",
            body: bytes,
        },
        Err(err) => {
            error!("PNG encoding failed: {}", err);
            Reply::text(500, err.to_string())
        },
    }
}

/// Only bare "*.log" names, nothing that walks out of the log directory.
pub fn log_file_name(name: &str) -> Option<&str> {
    if name.len() <= ".log".len() || !name.ends_with(".log") {
        return None;
    }
    if name.starts_with('.') || name.contains('/') || name.contains('\\') {
        return None;
    }
    return Some(name);
}

fn dump_log(params: &[(String, String)], log_dir: &std::path::Path) -> Reply {
    let filename = match param(params, "log").and_then(log_file_name) {
        Some(filename) => filename,
        None => return Reply::not_found(),
    };

    match std::fs::read_to_string(log_dir.join(filename)) {
        Ok(contents) => Reply::text(200, contents),
        Err(_) => Reply::not_found(),
    }
}

fn log_files(log_dir: &std::path::Path) -> std::io::Result<Vec<(String, u64)>> {
    let mut files = vec![];
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if log_file_name(&name).is_some() {
            files.push((name, entry.metadata()?.len()));
        }
    }
    files.sort();
    return Ok(files);
}

fn main_page(settings: &config::Settings, log_dir: &std::path::Path) -> Reply {
    let mut body = format!("<html><body><h1>ÖBB Abfahrtsmonitor</h1><div>Version {}</div>",
                           env!("CARGO_PKG_VERSION"));

    body.push_str(&format!(
        "<div><h2>Einstellungen</h2><form action='/save' method='get'>\
         <label>Station <input name='station' maxlength='{}' value='{}'></label> \
         <label>Gleis <input name='track' maxlength='{}' value='{}'></label> \
         <input type='submit' value='Speichern'></form>\
         <p>Gleis leer lassen für alle Gleise. Aktuell: {}</p></div>",
        config::MAX_STATION_ID_LEN, escape_html(&settings.station_id),
        config::MAX_TRACK_ID_LEN, escape_html(&settings.track_id),
        escape_html(settings.describe_track())));

    body.push_str("<div><h2>Current image</h2><img style='border: 1px solid black;' src='/current_image' /></div>");

    body.push_str("<div><h2>Log files</h2><ul>");
    match log_files(log_dir) {
        Ok(files) => {
            for (filename, len) in files {
                body.push_str(&format!("<li><a href='{}'>{}</a> [{}]</li>",
                                       escape_html(&dumplog_href(&filename)), escape_html(&filename),
                                       pretty_bytes::converter::convert(len as f64)));
            }
        },
        Err(err) => body.push_str(&format!("<li>{}</li>", escape_html(&err.to_string()))),
    }
    body.push_str("</ul></div>");

    body.push_str("</body></html>");
    return Reply::html(200, body);
}

fn dumplog_href(filename: &str) -> String {
    match reqwest::Url::parse_with_params("http://localhost/dumplog", &[("log", filename)]) {
        Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or("")),
        Err(_) => "/dumplog".to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    return escaped;
}
