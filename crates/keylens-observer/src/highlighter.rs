#![forbid(unsafe_code)]

//! Overlay boxes drawn around tracked elements.
//!
//! The target element's own styling is never touched: each highlighted
//! element gets a fixed-position `div` appended to the body, sized from the
//! element's current layout rectangle.

use keylens_core::{DEVTOOLS_Z_INDEX, HIGHLIGHTER_CLASS, ObserverOptions};
use keylens_dom::{Dom, element_clickable};

use crate::meta::ElementMeta;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHighlighter {
    color: String,
    width: u32,
}

impl Default for ElementHighlighter {
    fn default() -> Self {
        Self::from_options(&ObserverOptions::default())
    }
}

impl ElementHighlighter {
    #[must_use]
    pub fn new(color: impl Into<String>, width: u32) -> Self {
        Self {
            color: color.into(),
            width,
        }
    }

    #[must_use]
    pub fn from_options(options: &ObserverOptions) -> Self {
        Self::new(options.highlight_color.clone(), options.highlight_width)
    }

    /// Create or reposition the overlay. No-op for disconnected elements.
    pub fn highlight<D: Dom>(&self, dom: &mut D, meta: &mut ElementMeta<D::Node>) {
        if !dom.is_connected(&meta.element) {
            return;
        }
        let overlay = match meta.overlay.clone() {
            Some(overlay) => overlay,
            None => {
                let Some(overlay) = dom.create_overlay(HIGHLIGHTER_CLASS) else {
                    return;
                };
                meta.overlay = Some(overlay.clone());
                overlay
            }
        };

        let rect = dom.bounding_client_rect(&meta.element);
        let width = f64::from(self.width);
        let pointer_events = if element_clickable(&*dom, &meta.element) {
            "none"
        } else {
            "auto"
        };
        let styles = [
            ("position", "fixed".to_owned()),
            ("z-index", DEVTOOLS_Z_INDEX.to_string()),
            ("top", px(rect.top() - width)),
            ("left", px(rect.left() - width)),
            ("width", px(rect.width)),
            ("height", px(rect.height)),
            ("border", format!("{}px solid {}", self.width, self.color)),
            ("pointer-events", pointer_events.to_owned()),
        ];
        for (property, value) in &styles {
            dom.set_style(&overlay, property, value);
        }
    }

    pub fn unhighlight<D: Dom>(&self, dom: &mut D, meta: &mut ElementMeta<D::Node>) {
        if let Some(overlay) = meta.overlay.take() {
            dom.remove_node(&overlay);
        }
    }
}

fn px(value: f64) -> String {
    format!("{value}px")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keylens_dom::{MemoryDom, Rect};
    use pretty_assertions::assert_eq;

    #[test]
    fn overlay_surrounds_the_element_rect() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let p = dom.append_element(body, "p");
        dom.set_rect(p, Rect::new(10.0, 20.0, 100.0, 30.0));
        let mut meta = ElementMeta::new(p);
        let highlighter = ElementHighlighter::default();

        highlighter.highlight(&mut dom, &mut meta);
        let overlay = meta.overlay.expect("overlay created");
        assert_eq!(dom.get_attribute(&overlay, "class").as_deref(), Some(HIGHLIGHTER_CLASS));
        assert_eq!(dom.style(overlay, "top"), Some("15px"));
        assert_eq!(dom.style(overlay, "left"), Some("5px"));
        assert_eq!(dom.style(overlay, "width"), Some("100px"));
        assert_eq!(dom.style(overlay, "height"), Some("30px"));
        assert_eq!(dom.style(overlay, "border"), Some("5px solid #ff0000"));
        assert_eq!(dom.style(overlay, "pointer-events"), Some("none"));

        dom.set_rect(p, Rect::new(10.0, 40.0, 100.0, 30.0));
        highlighter.highlight(&mut dom, &mut meta);
        assert_eq!(meta.overlay, Some(overlay));
        assert_eq!(dom.style(overlay, "top"), Some("35px"));

        highlighter.unhighlight(&mut dom, &mut meta);
        assert_eq!(meta.overlay, None);
        assert!(!dom.is_connected(&overlay));
    }

    #[test]
    fn disabled_elements_capture_pointer_events() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let button = dom.append_element(body, "button");
        dom.set_attribute(button, "disabled", "");
        let mut meta = ElementMeta::new(button);
        let highlighter = ElementHighlighter::new("blue", 2);
        highlighter.highlight(&mut dom, &mut meta);
        let overlay = meta.overlay.expect("overlay created");
        assert_eq!(dom.style(overlay, "pointer-events"), Some("auto"));
        assert_eq!(dom.style(overlay, "border"), Some("2px solid blue"));
    }

    #[test]
    fn disconnected_elements_are_not_highlighted() {
        let mut dom = MemoryDom::new();
        let loose = dom.create_element("p");
        let mut meta = ElementMeta::new(loose);
        ElementHighlighter::default().highlight(&mut dom, &mut meta);
        assert_eq!(meta.overlay, None);
    }
}
