//! Server-rendered HTML pages.
//!
//! Pages are plain strings built with `format!`. Every value that comes from
//! a user or the database goes through [`html_escape`] (or
//! `urlencoding::encode` when placed in a URL) before it is interpolated.
//! Item info is the one exception: it is markdown, rendered by
//! [`render_markdown`] with raw HTML escaped.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use crate::catalog::{Item, ItemFilter};
use crate::principal::Principal;

use super::form::ItemForm;

/// Site-wide settings the pages need.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Base URL item images are served from
    pub image_url: String,

    /// Route noun for item pages (`/<entity>/<name>`)
    pub entity: String,
}

impl SiteConfig {
    pub fn new(image_url: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into().trim_end_matches('/').to_string(),
            entity: entity.into(),
        }
    }

    /// Public URL of an item's image.
    pub fn image_src(&self, name: &str) -> String {
        format!("{}/{}.jpg", self.image_url, urlencoding::encode(name))
    }

    /// Path of an item's detail page.
    pub fn item_href(&self, name: &str) -> String {
        format!("/{}/{}", self.entity, urlencoding::encode(name))
    }

    /// Capitalized route noun for headings ("Game", "Item").
    pub fn noun(&self) -> String {
        let mut chars = self.entity.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Per-request page chrome: who is looking and what to tell them.
pub struct Chrome<'a> {
    pub principal: &'a Principal,
    pub site: &'a SiteConfig,
    pub flash: Option<String>,
}

/// Distinct values offered by the filter selects.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub owners: Vec<String>,
    pub players: Vec<String>,
    pub submitters: Vec<String>,
}

/// Everything needed to render the submit/edit form.
pub struct FormView<'a> {
    pub title: &'a str,
    pub action: String,
    pub form: &'a ItemForm,
    pub error: Option<&'a str>,
    pub item_names: &'a [String],
    pub image_required: bool,
    pub csrf_token: Option<&'a str>,
}

/// Escape HTML special characters to prevent XSS attacks.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Render markdown to HTML. Raw HTML in the source is shown as text and
/// script-capable link targets are dropped.
pub fn render_markdown(text: &str) -> String {
    let events = Parser::new_ext(text, Options::empty()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url
        .split_once(':')
        .map(|(scheme, _)| scheme.trim().to_ascii_lowercase());
    match scheme.as_deref() {
        Some("javascript" | "vbscript" | "data") => CowStr::Borrowed("#"),
        _ => url,
    }
}

// =============================================================================
// Layout
// =============================================================================

fn layout(chrome: &Chrome<'_>, title: &str, body: &str) -> String {
    let flash = chrome
        .flash
        .as_deref()
        .map(|m| format!(r#"<div class="flash">{}</div>"#, html_escape(m)))
        .unwrap_or_default();
    let badge = if chrome.principal.quartermaster {
        r#" <span class="badge">quartermaster</span>"#
    } else {
        ""
    };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Stuff</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0 auto;
            max-width: 960px;
            padding: 0 16px 32px;
            color: #222;
        }}
        nav {{
            display: flex;
            gap: 16px;
            align-items: center;
            padding: 12px 0;
            border-bottom: 1px solid #ddd;
            margin-bottom: 16px;
        }}
        nav .user {{
            margin-left: auto;
            color: #666;
        }}
        .badge {{
            background: #eef;
            color: #449;
            padding: 2px 6px;
            border-radius: 4px;
            font-size: 11px;
        }}
        .flash {{
            background: #efe;
            border: 1px solid #9c9;
            padding: 8px 12px;
            border-radius: 4px;
            margin-bottom: 16px;
        }}
        .error {{
            background: #fee;
            border: 1px solid #c99;
            padding: 8px 12px;
            border-radius: 4px;
            margin-bottom: 16px;
        }}
        .grid {{
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(200px, 1fr));
            gap: 16px;
        }}
        .card img, .detail img {{
            max-width: 100%;
        }}
        .card a {{
            color: inherit;
            text-decoration: none;
        }}
        .info pre {{
            white-space: pre-wrap;
        }}
        form.filters {{
            display: flex;
            gap: 8px;
            flex-wrap: wrap;
            margin-bottom: 16px;
        }}
        form.item label {{
            display: block;
            margin-top: 12px;
        }}
    </style>
</head>
<body>
    <nav>
        <a href="/">Stuff</a>
        <a href="/random">Random</a>
        <a href="/submissions">My submissions</a>
        <a href="/submit">New {noun}</a>
        <span class="user">{username}{badge}</span>
        <a href="/logout">Log out</a>
    </nav>
    {flash}
    {body}
</body>
</html>"##,
        title = html_escape(title),
        noun = html_escape(&chrome.site.noun()),
        username = html_escape(&chrome.principal.username),
        badge = badge,
        flash = flash,
        body = body,
    )
}

fn item_cards(chrome: &Chrome<'_>, items: &[Item]) -> String {
    if items.is_empty() {
        return r#"<p class="empty">Nothing here yet.</p>"#.to_string();
    }

    let cards: Vec<String> = items
        .iter()
        .map(|item| {
            let players = item
                .players
                .as_deref()
                .map(|p| format!("<br><small>{} players</small>", html_escape(p)))
                .unwrap_or_default();
            format!(
                r#"<div class="card"><a href="{href}"><img src="{src}" alt="{name}" loading="lazy"><br><strong>{name}</strong></a><br><small>owned by {owner}</small>{players}</div>"#,
                href = html_escape(&chrome.site.item_href(&item.name)),
                src = html_escape(&chrome.site.image_src(&item.name)),
                name = html_escape(&item.name),
                owner = html_escape(&item.owner),
                players = players,
            )
        })
        .collect();

    format!(r#"<div class="grid">{}</div>"#, cards.join("\n"))
}

fn select(name: &str, label: &str, options: &[String], selected: Option<&str>) -> String {
    let mut html = format!(
        r#"<select name="{name}"><option value="">{label}</option>"#,
        name = name,
        label = html_escape(label),
    );
    for option in options {
        let marker = if selected == Some(option.as_str()) {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            r#"<option value="{value}"{marker}>{value}</option>"#,
            value = html_escape(option),
            marker = marker,
        ));
    }
    html.push_str("</select>");
    html
}

fn csrf_input(token: Option<&str>) -> String {
    token
        .map(|t| {
            format!(
                r#"<input type="hidden" name="csrf_token" value="{}">"#,
                html_escape(t)
            )
        })
        .unwrap_or_default()
}

// =============================================================================
// Pages
// =============================================================================

/// The catalog listing with its filter bar.
pub fn render_index(
    chrome: &Chrome<'_>,
    heading: &str,
    filter: &ItemFilter,
    options: &FilterOptions,
    items: &[Item],
) -> String {
    let filters = format!(
        r#"<form class="filters" method="get" action="/">
        <input type="search" name="name" placeholder="Name" value="{name}">
        {owners}
        {players}
        {submitters}
        <button type="submit">Filter</button>
        {clear}
    </form>"#,
        name = html_escape(filter.name.as_deref().unwrap_or("")),
        owners = select("owner", "Any owner", &options.owners, filter.owner.as_deref()),
        players = select(
            "players",
            "Any players",
            &options.players,
            filter.players.as_deref()
        ),
        submitters = select(
            "submitter",
            "Any submitter",
            &options.submitters,
            filter.submitter.as_deref()
        ),
        clear = if filter.is_empty() {
            ""
        } else {
            r#"<a href="/">Clear</a>"#
        },
    );

    let body = format!(
        "<h1>{}</h1>\n    {}\n    <p>{} shown</p>\n    {}",
        html_escape(heading),
        filters,
        items.len(),
        item_cards(chrome, items),
    );
    layout(chrome, heading, &body)
}

/// Items submitted by the current user.
pub fn render_submissions(chrome: &Chrome<'_>, items: &[Item]) -> String {
    let body = format!(
        "<h1>My submissions</h1>\n    {}",
        item_cards(chrome, items)
    );
    layout(chrome, "My submissions", &body)
}

/// Detail page for one item.
pub fn render_item(
    chrome: &Chrome<'_>,
    item: &Item,
    expansions: &[String],
    csrf_token: Option<&str>,
) -> String {
    let encoded = urlencoding::encode(&item.name);

    let players = item
        .players
        .as_deref()
        .map(|p| format!("<p><strong>Players:</strong> {}</p>", html_escape(p)))
        .unwrap_or_default();

    let expansions = if expansions.is_empty() {
        String::new()
    } else {
        let links: Vec<String> = expansions
            .iter()
            .map(|name| {
                format!(
                    r#"<li><a href="{}">{}</a></li>"#,
                    html_escape(&chrome.site.item_href(name)),
                    html_escape(name)
                )
            })
            .collect();
        format!("<h2>Expansions</h2><ul>{}</ul>", links.join(""))
    };

    let delete = if chrome.principal.username == item.submitter {
        format!(
            r#"<form method="post" action="/delete/{encoded}" onsubmit="return confirm('Delete this?');">{csrf}<button type="submit">Delete</button></form>"#,
            encoded = encoded,
            csrf = csrf_input(csrf_token),
        )
    } else {
        String::new()
    };

    let body = format!(
        r#"<div class="detail">
        <h1>{name}</h1>
        <img src="{src}" alt="{name}">
        <p><strong>Owner:</strong> {owner}</p>
        <p><strong>Submitted by:</strong> {submitter} on {created}</p>
        {players}
        <div class="info">{info}</div>
        {expansions}
        <p><a href="/edit/{encoded}">Edit</a></p>
        {delete}
    </div>"#,
        name = html_escape(&item.name),
        src = html_escape(&chrome.site.image_src(&item.name)),
        owner = html_escape(&item.owner),
        submitter = html_escape(&item.submitter),
        created = item.created_at.format("%Y-%m-%d"),
        players = players,
        info = render_markdown(&item.info),
        expansions = expansions,
        encoded = encoded,
        delete = delete,
    );
    layout(chrome, &item.name, &body)
}

/// The submit/edit form, with the error that sent it back if any.
pub fn render_form(chrome: &Chrome<'_>, view: &FormView<'_>) -> String {
    let error = view
        .error
        .map(|e| format!(r#"<div class="error">{}</div>"#, html_escape(e)))
        .unwrap_or_default();

    let names: Vec<String> = view
        .item_names
        .iter()
        .map(|n| format!(r#"<option value="{}">"#, html_escape(n)))
        .collect();

    let image_hint = if view.image_required {
        " required"
    } else {
        ""
    };

    let body = format!(
        r#"<h1>{title}</h1>
    {error}
    <form class="item" method="post" action="{action}" enctype="multipart/form-data">
        {csrf}
        <label>Name <input type="text" name="name" list="item-names" maxlength="128" value="{name}" required></label>
        <datalist id="item-names">{names}</datalist>
        <label>Owner <input type="text" name="owner" maxlength="64" value="{owner}" required></label>
        <label>Players <input type="text" name="players" maxlength="32" value="{players}" placeholder="2-4"></label>
        <label>Info <textarea name="info" rows="10" maxlength="10000">{info}</textarea></label>
        <label>Image <input type="file" name="image" accept="image/*"{image_hint}></label>
        <p><button type="submit">Save</button></p>
    </form>"#,
        title = html_escape(view.title),
        error = error,
        action = html_escape(&view.action),
        csrf = csrf_input(view.csrf_token),
        name = html_escape(&view.form.name),
        names = names.join(""),
        owner = html_escape(&view.form.owner),
        players = html_escape(&view.form.players),
        info = html_escape(&view.form.info),
        image_hint = image_hint,
    );
    layout(chrome, view.title, &body)
}

/// Minimal standalone page (no chrome, the user may not be logged in).
pub fn render_notice(title: &str, message: &str, link: Option<(&str, &str)>) -> String {
    let link = link
        .map(|(href, text)| {
            format!(
                r#"<p><a href="{}">{}</a></p>"#,
                html_escape(href),
                html_escape(text)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{title} - Stuff</title></head>
<body>
    <h1>{title}</h1>
    <p>{message}</p>
    {link}
</body>
</html>"#,
        title = html_escape(title),
        message = html_escape(message),
        link = link,
    )
}

/// Error page for `status`.
pub fn render_error(status: u16, message: &str) -> String {
    render_notice(
        &status.to_string(),
        message,
        Some(("/", "Back to the catalog")),
    )
}
