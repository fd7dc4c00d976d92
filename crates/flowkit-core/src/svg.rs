//! Vector-art node import.
//!
//! A payload is scanned tag by tag (no DOM is built). The root `<svg>`
//! gives the node its natural size; the first `rotate(...)` transform in
//! document order gives its initial rotation; elements carrying a
//! `data-port` attribute become ports and are stripped from the content
//! handed to the renderer.
//!
//! Built on `winnow` 0.7, in the same shape as a streaming text parser:
//! each tag is parsed from a `&mut &str` cursor and byte offsets are
//! recovered from what remains.

use crate::config::GraphConfig;
use crate::error::ImportError;
use crate::geometry::PORT_HALF;
use crate::id::ElementId;
use crate::model::{Node, NodeKind, NodeTemplate, Port, PortDirection};
use crate::transform::TransformParams;
use kurbo::{Point, Rect, Size};
use std::ops::Range;
use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{alt, delimited, opt, preceded, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

/// A request to turn a vector-art payload into a node.
#[derive(Debug, Clone)]
pub struct SvgImport<'a> {
    pub id: &'a str,
    /// Drop position, in the parent's frame.
    pub position: Point,
    pub payload: &'a str,
    /// Display name; the id is used when absent.
    pub name: Option<&'a str>,
    pub flip_horizontal: Option<f64>,
    pub flip_vertical: Option<f64>,
}

impl<'a> SvgImport<'a> {
    pub fn new(id: &'a str, position: Point, payload: &'a str) -> Self {
        Self {
            id,
            position,
            payload,
            name: None,
            flip_horizontal: None,
            flip_vertical: None,
        }
    }

    pub fn with_flips(mut self, horizontal: Option<f64>, vertical: Option<f64>) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }
}

/// Build a vector-art node from `request.payload`.
///
/// Fails only when the payload has no usable `<svg>` root. Problems past the
/// root while looking for port markers are logged and yield a node with no
/// ports.
pub fn import_svg_node(request: &SvgImport<'_>, config: &GraphConfig) -> Result<NodeTemplate, ImportError> {
    let payload = request.payload;
    let mut scanner = Scanner::new(payload);
    let root = loop {
        match scanner.next_token()? {
            Some(Token::Open { name: "svg", attrs, .. }) => break attrs,
            Some(_) => continue,
            None => return Err(ImportError::MissingSvgRoot),
        }
    };

    let frame = root_frame(&root, config)?;
    let rotation = first_rotation(&root, &mut Scanner::new(payload));
    let size = frame.size();

    let id = ElementId::intern(request.id);
    let (mut ports, content): (Vec<Port>, String) = match extract_markers(id, payload, frame) {
        Ok(found) => {
            let content = strip_spans(payload, found.iter().map(|m| m.span.clone()));
            (found.into_iter().map(|m| m.port).collect(), content)
        }
        Err(e) => {
            log::warn!("port markers in '{id}' could not be read ({e}); importing without ports");
            (Vec::new(), payload.to_string())
        }
    };

    let mut node = Node::new(
        id,
        NodeKind::Svg {
            content,
            source: Some(payload.to_string()),
        },
        request.position,
        size,
        request.name.unwrap_or(request.id),
    );
    node.flip_horizontal = request.flip_horizontal;
    node.flip_vertical = request.flip_vertical;

    if let Some(rotate) = rotation {
        node.rotation = rotate.angle;
        node.pivot = rotate.pivot_in(frame);
        let params = TransformParams::of(&node);
        for port in &mut ports {
            params.apply(port);
        }
    }

    log::debug!(
        "imported svg node {id}: {}x{}, rotation {}, {} port(s)",
        size.width,
        size.height,
        node.rotation,
        ports.len()
    );
    Ok(NodeTemplate {
        node,
        ports,
        children: Vec::new(),
    })
}

/// What a saved vector-art node re-derives from its source payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerLayout {
    /// Declared rotation pivot, local to the node.
    pub pivot: Option<Point>,
    /// Unrotated port positions, keyed by the ids `import_svg_node` gives.
    pub baselines: Vec<(ElementId, Point)>,
}

/// Re-read the markers and rotation pivot of `source`.
///
/// Used when a saved node is reloaded: its ports are re-derived from the
/// original payload rather than trusted from the document.
pub fn marker_layout(node_id: ElementId, source: &str, config: &GraphConfig) -> Result<MarkerLayout, ImportError> {
    let mut scanner = Scanner::new(source);
    let root = loop {
        match scanner.next_token()? {
            Some(Token::Open { name: "svg", attrs, .. }) => break attrs,
            Some(_) => continue,
            None => return Err(ImportError::MissingSvgRoot),
        }
    };
    let frame = root_frame(&root, config)?;
    let pivot = first_rotation(&root, &mut Scanner::new(source)).and_then(|r| r.pivot_in(frame));
    let baselines = extract_markers(node_id, source, frame)?
        .into_iter()
        .map(|m| (m.port.id, m.port.position))
        .collect();
    Ok(MarkerLayout { pivot, baselines })
}

// ─── Root frame and transforms ──────────────────────────────────────────

/// The root's user-space rectangle: `viewBox` if present, else
/// `width`/`height` at the origin, else the configured default.
fn root_frame(attrs: &[(&str, &str)], config: &GraphConfig) -> Result<Rect, ImportError> {
    if let Some(view_box) = attr(attrs, "viewBox") {
        let values = number_list(view_box)
            .filter(|v| v.len() == 4)
            .ok_or_else(|| ImportError::InvalidSize(view_box.to_string()))?;
        let (w, h) = (values[2], values[3]);
        if !(w > 0.0 && h > 0.0) {
            return Err(ImportError::InvalidSize(view_box.to_string()));
        }
        return Ok(Rect::from_origin_size((values[0], values[1]), (w, h)));
    }

    let width = attr(attrs, "width").and_then(length);
    let height = attr(attrs, "height").and_then(length);
    let size = Size::new(
        width.unwrap_or(config.default_svg_width),
        height.unwrap_or(config.default_svg_height),
    );
    Ok(Rect::from_origin_size(Point::ZERO, size))
}

/// A `width`/`height` attribute: a positive number with an optional `px`.
/// Relative units (`%`, `em`) are not resolvable here and read as absent.
fn length(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let digits = trimmed.strip_suffix("px").unwrap_or(trimmed);
    whole_number(digits).filter(|v| *v > 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rotate {
    angle: f64,
    center: Option<Point>,
}

impl Rotate {
    /// The declared centre, moved into the node's local frame.
    fn pivot_in(&self, frame: Rect) -> Option<Point> {
        self.center.map(|c| Point::new(c.x - frame.x0, c.y - frame.y0))
    }
}

/// The first `rotate(a[, cx, cy])` in document order, starting at the root.
fn first_rotation(root: &[(&str, &str)], scanner: &mut Scanner<'_>) -> Option<Rotate> {
    if let Some(r) = attr(root, "transform").and_then(parse_rotate) {
        return Some(r);
    }
    let mut seen_root = false;
    while let Ok(Some(token)) = scanner.next_token() {
        if let Token::Open { name, attrs, .. } = token {
            if !seen_root {
                seen_root = name == "svg";
                continue;
            }
            if let Some(r) = attr(&attrs, "transform").and_then(parse_rotate) {
                return Some(r);
            }
        }
    }
    None
}

fn parse_rotate(transform: &str) -> Option<Rotate> {
    let start = transform.find("rotate")?;
    let mut rest = &transform[start..];
    let args = rotate_args.parse_next(&mut rest).ok()?;
    match args.as_slice() {
        [angle] => Some(Rotate {
            angle: *angle,
            center: None,
        }),
        [angle, cx, cy] => Some(Rotate {
            angle: *angle,
            center: Some(Point::new(*cx, *cy)),
        }),
        _ => None,
    }
}

fn rotate_args(input: &mut &str) -> ModalResult<Vec<f64>> {
    let _ = "rotate".parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let _ = '('.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let values = numbers.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let _ = ')'.parse_next(input)?;
    Ok(values)
}

// ─── Markers ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Marker {
    port: Port,
    /// Byte range of the whole marker element, closing tag included.
    span: Range<usize>,
}

fn extract_markers(node_id: ElementId, payload: &str, frame: Rect) -> Result<Vec<Marker>, ImportError> {
    let mut scanner = Scanner::new(payload);
    let mut markers = Vec::new();
    let mut inputs = 0usize;
    let mut outputs = 0usize;

    while let Some(token) = scanner.next_token()? {
        let Token::Open {
            name,
            attrs,
            self_closing,
            span,
        } = token
        else {
            continue;
        };
        let Some(kind) = attr(&attrs, "data-port") else {
            continue;
        };

        let (end, content_box) = if self_closing {
            (span.end, None)
        } else {
            scanner.skip_element(name, span.start)?
        };

        let direction = if kind == "in" {
            PortDirection::Input
        } else {
            PortDirection::Output
        };
        let ordinal = match direction {
            PortDirection::Input => &mut inputs,
            PortDirection::Output => &mut outputs,
        };
        let suffix = match direction {
            PortDirection::Input => format!("in-{ordinal}"),
            PortDirection::Output => format!("out-{ordinal}"),
        };
        *ordinal += 1;

        let own_box = || marker_box(name, &attrs).ok_or(ImportError::Malformed { offset: span.start });
        let bbox = match content_box {
            Some(b) if !is_shape(name) => b,
            _ => own_box()?,
        };
        let center = bbox.center();
        let mut port = Port::new(node_id.child(&suffix), direction, direction.default_side());
        port.position = Point::new(
            center.x - frame.x0 - PORT_HALF,
            center.y - frame.y0 - PORT_HALF,
        );
        port.label = attr(&attrs, "data-label")
            .or_else(|| attr(&attrs, "class"))
            .map(str::to_string);

        markers.push(Marker {
            port,
            span: span.start..end,
        });
    }
    Ok(markers)
}

/// The element's box from its shape geometry. Missing attributes read as
/// zero; a present but non-numeric one is an error.
fn marker_box(name: &str, attrs: &[(&str, &str)]) -> Option<Rect> {
    let num = |key: &str| -> Option<f64> {
        match attr(attrs, key) {
            Some(v) => whole_number(v.trim()),
            None => Some(0.0),
        }
    };
    let rect = match name {
        "circle" => {
            let (cx, cy, r) = (num("cx")?, num("cy")?, num("r")?);
            Rect::new(cx - r, cy - r, cx + r, cy + r)
        }
        "ellipse" => {
            let (cx, cy, rx, ry) = (num("cx")?, num("cy")?, num("rx")?, num("ry")?);
            Rect::new(cx - rx, cy - ry, cx + rx, cy + ry)
        }
        _ => {
            let (x, y) = (num("x")?, num("y")?);
            let (w, h) = (num("width")?, num("height")?);
            Rect::from_origin_size((x, y), (w.max(0.0), h.max(0.0)))
        }
    };
    Some(rect)
}

/// Elements whose own attributes describe their geometry. Anything else
/// (`g`, `a`, `symbol`, ...) takes the union of the shapes inside it.
fn is_shape(name: &str) -> bool {
    matches!(name, "rect" | "circle" | "ellipse" | "image" | "use")
}

/// Copy `payload` minus the given (ordered, non-overlapping) byte ranges.
fn strip_spans(payload: &str, spans: impl Iterator<Item = Range<usize>>) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&payload[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&payload[cursor..]);
    out
}

fn attr<'a>(attrs: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

// ─── Tag scanner ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Open {
        name: &'a str,
        attrs: Vec<(&'a str, &'a str)>,
        self_closing: bool,
        span: Range<usize>,
    },
    Close {
        name: &'a str,
        span: Range<usize>,
    },
}

struct Scanner<'a> {
    src: &'a str,
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, rest: src }
    }

    fn offset(&self) -> usize {
        self.src.len() - self.rest.len()
    }

    /// The next tag, skipping text, comments, CDATA, processing
    /// instructions and declarations. `Ok(None)` at end of input.
    fn next_token(&mut self) -> Result<Option<Token<'a>>, ImportError> {
        loop {
            let Some(lt) = self.rest.find('<') else {
                self.rest = "";
                return Ok(None);
            };
            self.rest = &self.rest[lt..];
            let start = self.offset();

            let skipped = [("<!--", "-->"), ("<![CDATA[", "]]>"), ("<?", "?>"), ("<!", ">")]
                .into_iter()
                .find(|(open, _)| self.rest.starts_with(open));
            if let Some((open, close)) = skipped {
                let body = &self.rest[open.len()..];
                let end = body.find(close).ok_or(ImportError::Malformed { offset: start })?;
                self.rest = &body[end + close.len()..];
                continue;
            }

            if self.rest.starts_with("</") {
                let name = close_tag
                    .parse_next(&mut self.rest)
                    .map_err(|_| ImportError::Malformed { offset: start })?;
                return Ok(Some(Token::Close {
                    name,
                    span: start..self.offset(),
                }));
            }

            let (name, attrs, self_closing) = open_tag
                .parse_next(&mut self.rest)
                .map_err(|_| ImportError::Malformed { offset: start })?;
            return Ok(Some(Token::Open {
                name,
                attrs,
                self_closing,
                span: start..self.offset(),
            }));
        }
    }

    /// Advance past the close tag matching an already-consumed `<name>`.
    ///
    /// Returns the offset just after it and the union of the boxes of the
    /// shapes passed on the way (`None` when there were none).
    fn skip_element(&mut self, name: &str, opened_at: usize) -> Result<(usize, Option<Rect>), ImportError> {
        let mut depth = 1usize;
        let mut bounds: Option<Rect> = None;
        while let Some(token) = self.next_token()? {
            match token {
                Token::Open {
                    name: n,
                    attrs,
                    self_closing,
                    span,
                } => {
                    if is_shape(n) {
                        let b = marker_box(n, &attrs).ok_or(ImportError::Malformed { offset: span.start })?;
                        bounds = Some(bounds.map_or(b, |u| u.union(b)));
                    }
                    if n == name && !self_closing {
                        depth += 1;
                    }
                }
                Token::Close { name: n, span } if n == name => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((span.end, bounds));
                    }
                }
                Token::Close { .. } => {}
            }
        }
        Err(ImportError::Malformed { offset: opened_at })
    }
}

fn tag_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || matches!(c, ':' | '-' | '_' | '.')).parse_next(input)
}

fn quoted<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .parse_next(input)
}

fn attribute<'a>(input: &mut &'a str) -> ModalResult<(&'a str, &'a str)> {
    let name = preceded(multispace1, tag_name).parse_next(input)?;
    let value = opt(preceded((multispace0, '=', multispace0), quoted)).parse_next(input)?;
    Ok((name, value.unwrap_or("")))
}

type OpenTag<'a> = (&'a str, Vec<(&'a str, &'a str)>, bool);

fn open_tag<'a>(input: &mut &'a str) -> ModalResult<OpenTag<'a>> {
    let _ = '<'.parse_next(input)?;
    let name = tag_name.parse_next(input)?;
    let attrs: Vec<(&str, &str)> = repeat(0.., attribute).parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let self_closing = alt(("/>".value(true), '>'.value(false))).parse_next(input)?;
    Ok((name, attrs, self_closing))
}

fn close_tag<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let _ = "</".parse_next(input)?;
    let name = tag_name.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    let _ = '>'.parse_next(input)?;
    Ok(name)
}

// ─── Numbers ────────────────────────────────────────────────────────────

fn number(input: &mut &str) -> ModalResult<f64> {
    let start = *input;
    if input.starts_with('-') || input.starts_with('+') {
        *input = &input[1..];
    }
    let int: &str = take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let mut frac = "";
    if input.starts_with('.') {
        *input = &input[1..];
        frac = take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    }
    if int.is_empty() && frac.is_empty() {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    if input.starts_with(['e', 'E']) {
        let checkpoint = *input;
        *input = &input[1..];
        if input.starts_with('-') || input.starts_with('+') {
            *input = &input[1..];
        }
        let exp: &str = take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)?;
        if exp.is_empty() {
            *input = checkpoint;
        }
    }
    let matched = &start[..start.len() - input.len()];
    matched
        .parse::<f64>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

fn list_separator(input: &mut &str) -> ModalResult<()> {
    let _ = multispace0.parse_next(input)?;
    let _ = opt(',').parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    Ok(())
}

/// Numbers separated by whitespace and/or commas.
fn numbers(input: &mut &str) -> ModalResult<Vec<f64>> {
    let first = number.parse_next(input)?;
    let rest: Vec<f64> = repeat(0.., preceded(list_separator, number)).parse_next(input)?;
    let mut out = Vec::with_capacity(rest.len() + 1);
    out.push(first);
    out.extend(rest);
    Ok(out)
}

fn number_list(text: &str) -> Option<Vec<f64>> {
    let mut rest = text.trim();
    let values = numbers.parse_next(&mut rest).ok()?;
    rest.trim().is_empty().then_some(values)
}

fn whole_number(text: &str) -> Option<f64> {
    let mut rest = text;
    let value = number.parse_next(&mut rest).ok()?;
    rest.is_empty().then_some(value)
}
