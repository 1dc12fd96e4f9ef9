//! Home page rendering
//!
//! The page body is generated from the [`Data`] aggregate and dropped into a
//! layout holding `{{ title }}` and `{{ content }}` placeholders. Every piece
//! of cluster text is HTML-escaped on the way in.

use dashboard_lib::data::{filter_by_application, filter_by_namespace};
use dashboard_lib::{pod_containers, Application, Data, Event, ObjectRecord};
use std::borrow::Cow;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Layout file looked up in the template directory
pub const LAYOUT_FILE: &str = "home.html";

const BUILTIN_LAYOUT: &str = include_str!("../templates/home.html");
const TITLE_PLACEHOLDER: &str = "{{ title }}";
const CONTENT_PLACEHOLDER: &str = "{{ content }}";

/// Number of events shown on the home page
const RECENT_EVENTS: usize = 20;

/// Display adapter escaping HTML special characters
pub struct Escaped<'a>(pub &'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(i) = rest.find(['&', '<', '>', '"', '\'']) {
            f.write_str(&rest[..i])?;
            f.write_str(match rest.as_bytes()[i] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&#39;",
            })?;
            rest = &rest[i + 1..];
        }
        f.write_str(rest)
    }
}

/// Renderer for the home page
#[derive(Debug, Clone)]
pub struct HomeView {
    title: String,
    layout_path: PathBuf,
    hot_reload: bool,
    layout: String,
}

impl HomeView {
    /// Load the layout from `template_dir`, falling back to the built-in one
    ///
    /// With `hot_reload` the layout is read again on every render.
    pub async fn load(template_dir: &Path, title: impl Into<String>, hot_reload: bool) -> Self {
        let layout_path = template_dir.join(LAYOUT_FILE);
        let layout = read_layout(&layout_path).await;
        Self {
            title: title.into(),
            layout_path,
            hot_reload,
            layout,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub async fn render(&self, data: &Data) -> String {
        let layout = if self.hot_reload {
            Cow::Owned(read_layout(&self.layout_path).await)
        } else {
            Cow::Borrowed(self.layout.as_str())
        };

        let title = Escaped(&self.title).to_string();
        fill_layout(&layout, &title, &render_content(data))
    }
}

async fn read_layout(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(layout) => layout,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Using built-in home layout");
            BUILTIN_LAYOUT.to_string()
        }
    }
}

/// Substitute the placeholders in a single pass
///
/// Substituted text is never scanned again, so placeholders appearing in
/// cluster data stay literal.
fn fill_layout(layout: &str, title: &str, content: &str) -> String {
    let mut out = String::with_capacity(layout.len() + content.len());
    let mut rest = layout;

    loop {
        let next = [(TITLE_PLACEHOLDER, title), (CONTENT_PLACEHOLDER, content)]
            .into_iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|i| (i, placeholder, value))
            })
            .min_by_key(|(i, _, _)| *i);

        match next {
            Some((i, placeholder, value)) => {
                out.push_str(&rest[..i]);
                out.push_str(value);
                rest = &rest[i + placeholder.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// HTML body of the home page
pub fn render_content(data: &Data) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_sections(&mut out, data);
    out
}

fn write_sections(out: &mut String, data: &Data) -> fmt::Result {
    write_projects(out, data)?;
    write_applications(out, data)?;
    write_pods(out, data)?;
    write_containers(out, data)?;
    write_events(out, data)
}

fn slice<T>(records: &Option<Vec<T>>) -> &[T] {
    records.as_deref().unwrap_or_default()
}

fn write_projects(out: &mut String, data: &Data) -> fmt::Result {
    let projects = slice(&data.projects);
    writeln!(out, "<section id=\"projects\">")?;
    writeln!(out, "<h2>Projects <small>({})</small></h2>", projects.len())?;
    writeln!(
        out,
        "<table><thead><tr><th>Project</th><th>Deployments</th><th>Services</th>\
         <th>Routes</th><th>Pods</th><th>Builds</th></tr></thead><tbody>"
    )?;
    for project in projects {
        let ns = project.name();
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            Escaped(ns),
            filter_by_namespace(slice(&data.deployment_configs), ns).len(),
            filter_by_namespace(slice(&data.services), ns).len(),
            filter_by_namespace(slice(&data.routes), ns).len(),
            filter_by_namespace(slice(&data.pods), ns).len(),
            filter_by_namespace(slice(&data.builds), ns).len(),
        )?;
    }
    writeln!(out, "</tbody></table>\n</section>")
}

fn write_applications(out: &mut String, data: &Data) -> fmt::Result {
    let applications = slice(&data.applications);
    writeln!(out, "<section id=\"applications\">")?;
    writeln!(out, "<h2>Applications <small>({})</small></h2>", applications.len())?;
    for application in applications {
        write_application(out, data, application)?;
    }
    writeln!(out, "</section>")
}

fn write_application(out: &mut String, data: &Data, application: &Application) -> fmt::Result {
    let dcs = filter_by_application(slice(&data.deployment_configs), application);
    let services = filter_by_application(slice(&data.services), application);
    let routes = filter_by_application(slice(&data.routes), application);

    writeln!(out, "<article class=\"application\">")?;
    writeln!(out, "<h3>{}</h3>", Escaped(application.name()))?;
    write_name_list(out, "Deployments", dcs.iter().map(|dc| (dc.namespace(), dc.name())))?;
    write_name_list(
        out,
        "Services",
        services.iter().map(|svc| (svc.namespace(), svc.name())),
    )?;

    writeln!(out, "<h4>Routes</h4><ul>")?;
    for route in &routes {
        let host = route
            .spec
            .as_ref()
            .and_then(|spec| spec.get("host"))
            .and_then(|host| host.as_str());
        match host {
            Some(host) => writeln!(
                out,
                "<li>{}/{} <a href=\"http://{host}\">{host}</a></li>",
                Escaped(route.namespace()),
                Escaped(route.name()),
                host = Escaped(host),
            )?,
            None => writeln!(
                out,
                "<li>{}/{}</li>",
                Escaped(route.namespace()),
                Escaped(route.name())
            )?,
        }
    }
    writeln!(out, "</ul>\n</article>")
}

fn write_name_list<'a>(
    out: &mut String,
    heading: &str,
    names: impl Iterator<Item = (&'a str, &'a str)>,
) -> fmt::Result {
    writeln!(out, "<h4>{heading}</h4><ul>")?;
    for (namespace, name) in names {
        writeln!(out, "<li>{}/{}</li>", Escaped(namespace), Escaped(name))?;
    }
    writeln!(out, "</ul>")
}

fn write_pods(out: &mut String, data: &Data) -> fmt::Result {
    let pods = slice(&data.pods);
    writeln!(out, "<section id=\"pods\">")?;
    writeln!(out, "<h2>Pods <small>({})</small></h2>", pods.len())?;
    writeln!(
        out,
        "<table><thead><tr><th>Project</th><th>Pod</th><th>Phase</th>\
         <th>Containers</th></tr></thead><tbody>"
    )?;
    for pod in pods {
        let phase = pod
            .status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            .unwrap_or("Unknown");
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            Escaped(pod.namespace()),
            Escaped(pod.name()),
            Escaped(phase),
            pod_containers(pod).len(),
        )?;
    }
    writeln!(out, "</tbody></table>\n</section>")
}

fn write_containers(out: &mut String, data: &Data) -> fmt::Result {
    let containers = slice(&data.containers);
    writeln!(out, "<section id=\"containers\">")?;
    writeln!(out, "<h2>Containers <small>({})</small></h2>", containers.len())?;
    writeln!(
        out,
        "<table><thead><tr><th>Container</th><th>Image</th></tr></thead><tbody>"
    )?;
    for container in containers {
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td></tr>",
            Escaped(&container.name),
            Escaped(container.image.as_deref().unwrap_or_default()),
        )?;
    }
    writeln!(out, "</tbody></table>\n</section>")
}

/// Most recent events first; events without a timestamp sort last
fn recent_events(events: &[Event]) -> Vec<&Event> {
    let mut recent: Vec<&Event> = events.iter().collect();
    recent.sort_by(|a, b| {
        let a = a.last_timestamp.as_ref().map(|t| t.0);
        let b = b.last_timestamp.as_ref().map(|t| t.0);
        b.cmp(&a)
    });
    recent.truncate(RECENT_EVENTS);
    recent
}

fn write_events(out: &mut String, data: &Data) -> fmt::Result {
    let events = recent_events(slice(&data.events));
    writeln!(out, "<section id=\"events\">")?;
    writeln!(out, "<h2>Recent events</h2>")?;
    writeln!(
        out,
        "<table><thead><tr><th>Time</th><th>Project</th><th>Object</th>\
         <th>Reason</th><th>Message</th></tr></thead><tbody>"
    )?;
    for event in events {
        let time = event
            .last_timestamp
            .as_ref()
            .map(|t| t.0.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let object = &event.involved_object;
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}/{}</td><td>{}</td><td>{}</td></tr>",
            Escaped(&time),
            Escaped(event.namespace()),
            Escaped(object.kind.as_deref().unwrap_or_default()),
            Escaped(object.name.as_deref().unwrap_or_default()),
            Escaped(event.reason.as_deref().unwrap_or_default()),
            Escaped(event.message.as_deref().unwrap_or_default()),
        )?;
    }
    writeln!(out, "</tbody></table>\n</section>")
}
