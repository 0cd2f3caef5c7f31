//! Button pages and navigation between them.
//!
//! Pages live in an arena and refer to each other by `PageId`. A button
//! either acts on its own (`Slot::Leaf`) or opens a child page
//! (`Slot::Nested`); on a child page the back button returns to the parent.

use crate::config::{self, Config};
use anyhow::{bail, Result};
use deckpanel_hw::{ButtonState, BUTTON_COUNT};
use image::Rgb;
use std::collections::HashMap;
use std::path::PathBuf;

/// Index of a page in the navigator arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(usize);

/// What a button looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub label: Option<String>,
    pub color: Rgb<u8>,
    pub image: Option<PathBuf>,
}

impl Face {
    fn back() -> Self {
        Self {
            label: Some("Back".to_string()),
            color: Rgb([0, 0, 0]),
            image: None,
        }
    }
}

/// A configured button.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Highlights while pressed.
    Leaf(Face),
    /// Opens a child page when pressed.
    Nested { face: Face, page: PageId },
    /// Returns to the parent page.
    Back(Face),
}

impl Slot {
    pub fn face(&self) -> &Face {
        match self {
            Slot::Leaf(face) | Slot::Back(face) => face,
            Slot::Nested { face, .. } => face,
        }
    }
}

#[derive(Debug)]
pub struct Page {
    pub name: String,
    pub parent: Option<PageId>,
    slots: Vec<Option<Slot>>,
}

/// How a button should currently be drawn.
#[derive(Debug, Clone, Copy)]
pub struct Look<'a> {
    pub face: Option<&'a Face>,
    pub highlighted: bool,
}

/// What changed after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    Nothing,
    Button(usize),
    Page,
}

/// Page navigation state machine.
#[derive(Debug)]
pub struct Navigator {
    pages: Vec<Page>,
    current: PageId,
    highlighted: [bool; BUTTON_COUNT],
}

impl Navigator {
    /// Builds the page arena from configuration.
    ///
    /// Fails on duplicate page names, unknown page references, colors that
    /// do not parse, and pages reachable from more than one parent.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.back_button >= BUTTON_COUNT {
            bail!("back_button {} out of range (0-14)", config.back_button);
        }

        let mut ids = HashMap::new();
        for (i, page) in config.pages.iter().enumerate() {
            if ids.insert(page.name.as_str(), PageId(i)).is_some() {
                bail!("Duplicate page name '{}'", page.name);
            }
        }
        let Some(&start) = ids.get(config.start_page.as_str()) else {
            bail!("Start page '{}' is not defined", config.start_page);
        };

        let mut pages: Vec<Page> = config
            .pages
            .iter()
            .map(|page| Page {
                name: page.name.clone(),
                parent: None,
                slots: vec![None; BUTTON_COUNT],
            })
            .collect();

        for (i, page_config) in config.pages.iter().enumerate() {
            for button in &page_config.buttons {
                if button.index >= BUTTON_COUNT {
                    bail!(
                        "Button {} on page '{}' out of range (0-14)",
                        button.index,
                        page_config.name
                    );
                }
                if pages[i].slots[button.index].is_some() {
                    bail!(
                        "Button {} defined twice on page '{}'",
                        button.index,
                        page_config.name
                    );
                }

                let field = format!("page '{}' button {}", page_config.name, button.index);
                let face = Face {
                    label: button.label.clone(),
                    color: config::color(&field, &button.color)?,
                    image: button.image.clone(),
                };

                let slot = match &button.open {
                    None => Slot::Leaf(face),
                    Some(target) => {
                        let Some(&child) = ids.get(target.as_str()) else {
                            bail!("{} opens unknown page '{}'", field, target);
                        };
                        if child == start {
                            bail!("{} opens the start page '{}'", field, target);
                        }
                        if child == PageId(i) {
                            bail!("{} opens its own page", field);
                        }
                        match pages[child.0].parent {
                            Some(parent) if parent != PageId(i) => bail!(
                                "Page '{}' is opened from both '{}' and '{}'",
                                target,
                                pages[parent.0].name,
                                page_config.name
                            ),
                            _ => pages[child.0].parent = Some(PageId(i)),
                        }
                        Slot::Nested { face, page: child }
                    }
                };
                pages[i].slots[button.index] = Some(slot);
            }
        }

        for page in pages.iter_mut().filter(|p| p.parent.is_some()) {
            let slot = &mut page.slots[config.back_button];
            if slot.is_some() {
                bail!(
                    "Button {} on page '{}' is reserved for going back",
                    config.back_button,
                    page.name
                );
            }
            *slot = Some(Slot::Back(Face::back()));
        }

        Ok(Self {
            pages,
            current: start,
            highlighted: [false; BUTTON_COUNT],
        })
    }

    pub fn current(&self) -> &Page {
        &self.pages[self.current.0]
    }

    /// Returns how a button on the current page should be drawn.
    pub fn look(&self, index: usize) -> Look<'_> {
        Look {
            face: self
                .current()
                .slots
                .get(index)
                .and_then(Option::as_ref)
                .map(Slot::face),
            highlighted: self.highlighted.get(index).copied().unwrap_or(false),
        }
    }

    /// Applies a button transition and reports what needs redrawing.
    pub fn handle(&mut self, index: usize, state: ButtonState) -> Redraw {
        let Some(Some(slot)) = self.current().slots.get(index) else {
            return Redraw::Nothing;
        };

        match state {
            ButtonState::Pressed => match slot {
                Slot::Leaf(_) => {
                    self.highlighted[index] = true;
                    Redraw::Button(index)
                }
                Slot::Nested { page, .. } => {
                    let page = *page;
                    self.show(page);
                    Redraw::Page
                }
                Slot::Back(_) => match self.current().parent {
                    Some(parent) => {
                        self.show(parent);
                        Redraw::Page
                    }
                    None => Redraw::Nothing,
                },
            },
            ButtonState::Released if self.highlighted[index] => {
                self.highlighted[index] = false;
                Redraw::Button(index)
            }
            ButtonState::Released => Redraw::Nothing,
        }
    }

    fn show(&mut self, page: PageId) {
        self.current = page;
        self.highlighted = [false; BUTTON_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn navigator(toml: &str) -> Result<Navigator> {
        let config: Config = toml::from_str(toml).unwrap();
        Navigator::from_config(&config)
    }

    const TREE: &str = r##"
        back_button = 4

        [[pages]]
        name = "home"

        [[pages.buttons]]
        index = 0
        label = "Lights"

        [[pages.buttons]]
        index = 1
        label = "Media"
        open = "media"

        [[pages]]
        name = "media"

        [[pages.buttons]]
        index = 2
        label = "Volume"
        open = "volume"

        [[pages]]
        name = "volume"

        [[pages.buttons]]
        index = 0
        label = "Up"
        color = "#00FF00"
    "##;

    #[test]
    fn test_builds_tree() {
        let nav = navigator(TREE).unwrap();
        assert_eq!(nav.current().name, "home");
        assert_eq!(nav.current().parent, None);
        assert_eq!(nav.pages[1].parent, Some(PageId(0)));
        assert_eq!(nav.pages[2].parent, Some(PageId(1)));
        // Back button only on child pages.
        assert!(nav.look(4).face.is_none());
        assert!(matches!(nav.pages[1].slots[4], Some(Slot::Back(_))));
    }

    #[test]
    fn test_default_config_has_start_page() {
        let nav = Navigator::from_config(&Config::default()).unwrap();
        assert_eq!(nav.current().name, "home");
        assert!((0..BUTTON_COUNT).all(|i| nav.look(i).face.is_none()));
    }

    #[test]
    fn test_leaf_highlights_while_pressed() {
        let mut nav = navigator(TREE).unwrap();
        assert_eq!(nav.handle(0, ButtonState::Pressed), Redraw::Button(0));
        assert!(nav.look(0).highlighted);
        assert_eq!(nav.handle(0, ButtonState::Released), Redraw::Button(0));
        assert!(!nav.look(0).highlighted);
    }

    #[test]
    fn test_nested_and_back() {
        let mut nav = navigator(TREE).unwrap();
        assert_eq!(nav.handle(1, ButtonState::Pressed), Redraw::Page);
        assert_eq!(nav.current().name, "media");
        // Release of the opening press lands on an empty slot.
        assert_eq!(nav.handle(1, ButtonState::Released), Redraw::Nothing);

        assert_eq!(nav.handle(2, ButtonState::Pressed), Redraw::Page);
        assert_eq!(nav.current().name, "volume");
        assert_eq!(
            nav.look(0).face.map(|f| f.color),
            Some(Rgb([0, 255, 0]))
        );

        assert_eq!(nav.handle(4, ButtonState::Pressed), Redraw::Page);
        assert_eq!(nav.current().name, "media");
        assert_eq!(nav.handle(4, ButtonState::Pressed), Redraw::Page);
        assert_eq!(nav.current().name, "home");
    }

    #[test]
    fn test_page_switch_drops_highlights() {
        let mut nav = navigator(TREE).unwrap();
        nav.handle(0, ButtonState::Pressed);
        nav.handle(1, ButtonState::Pressed);
        assert!(!nav.look(0).highlighted);
        assert_eq!(nav.handle(0, ButtonState::Released), Redraw::Nothing);
    }

    #[test]
    fn test_empty_slot_ignored() {
        let mut nav = navigator(TREE).unwrap();
        assert_eq!(nav.handle(9, ButtonState::Pressed), Redraw::Nothing);
        assert_eq!(nav.handle(99, ButtonState::Pressed), Redraw::Nothing);
        assert!(nav.look(99).face.is_none());
    }

    #[test]
    fn test_config_errors() {
        let cases = [
            (
                "[[pages]]\nname = \"home\"\n[[pages]]\nname = \"home\"",
                "Duplicate page name",
            ),
            ("[[pages]]\nname = \"other\"", "Start page"),
            (
                "[[pages]]\nname = \"home\"\n[[pages.buttons]]\nindex = 3\nopen = \"nowhere\"",
                "unknown page",
            ),
            (
                "[[pages]]\nname = \"home\"\n[[pages.buttons]]\nindex = 15",
                "out of range",
            ),
            (
                "[[pages]]\nname = \"home\"\n[[pages.buttons]]\nindex = 3\ncolor = \"blue\"",
                "Invalid color",
            ),
            (
                "[[pages]]\nname = \"home\"\n[[pages.buttons]]\nindex = 1\nopen = \"home\"",
                "start page",
            ),
            (
                "[[pages]]\nname = \"home\"\n[[pages.buttons]]\nindex = 1\nopen = \"a\"\n\
                 [[pages]]\nname = \"a\"\n[[pages.buttons]]\nindex = 0",
                "reserved",
            ),
            (
                "[[pages]]\nname = \"home\"\n[[pages.buttons]]\nindex = 1\nopen = \"a\"\n\
                 [[pages.buttons]]\nindex = 2\nopen = \"b\"\n\
                 [[pages]]\nname = \"a\"\n[[pages.buttons]]\nindex = 3\nopen = \"b\"\n\
                 [[pages]]\nname = \"b\"",
                "opened from both",
            ),
        ];

        for (toml, expected) in cases {
            let err = navigator(toml).unwrap_err().to_string();
            assert!(err.contains(expected), "{:?} did not mention {:?}", err, expected);
        }
    }
}
