//! Drag/gesture disambiguation.
//!
//! A pointer press becomes exactly one of: a viewport pan, an item drag, or
//! a box selection. The disambiguator translates input events into
//! `CanvasMutation`s which the controller applies to the viewport, the
//! selection and the item store.
//!
//! ## Pointer-down rules
//!
//! | Press | Target | Result |
//! |-------|--------|--------|
//! | middle button | anywhere | pan |
//! | primary + space held | anywhere | pan |
//! | primary | empty canvas | box select (clears selection) |
//! | primary | unselected item | select it, drag |
//! | primary + shift | unselected item | add it, drag the selection |
//! | primary + shift | selected item | deselect it, no drag |
//! | primary | selected item | drag the selection |
//!
//! Pans and drags only commit once the pointer has travelled more than
//! [`DRAG_THRESHOLD`] pixels on either axis; after that they track every
//! move.

use crate::hit::hit_test_rect;
use crate::input::{InputEvent, PointerButton};
use crate::selection::Selection;
use muse_core::config::{DRAG_THRESHOLD, snap};
use muse_core::layout::{Bounds, ItemMetrics};
use muse_core::{CanvasItem, ItemId, Point, ViewTransform};

/// A state change requested by a gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasMutation {
    SetViewOffset { offset_x: f64, offset_y: f64 },
    MoveItem { id: ItemId, position: Point },
    SelectOnly(ItemId),
    AddToSelection(ItemId),
    RemoveFromSelection(ItemId),
    ClearSelection,
    /// Overwrite the selection (box select).
    ReplaceSelection(Vec<ItemId>),
}

/// Everything a gesture needs to read from the canvas.
#[derive(Debug, Clone, Copy)]
pub struct GestureContext<'a> {
    pub items: &'a [CanvasItem],
    pub selection: &'a Selection,
    pub view: &'a ViewTransform,
    pub metrics: ItemMetrics,
    pub snap_to_grid: bool,
    /// Space held: primary presses pan instead of selecting.
    pub pan_key_held: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Panning {
        start: Point,
        start_offset: (f64, f64),
    },
    DraggingItem {
        start: Point,
        /// World start position of every item that moves with the drag.
        origins: Vec<(ItemId, Point)>,
    },
    BoxSelecting {
        start: Point,
        current: Point,
    },
}

#[derive(Debug, Default)]
pub struct GestureDisambiguator {
    state: GestureState,
    /// Latched once the pointer leaves the threshold box.
    moved: bool,
}

impl GestureDisambiguator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GestureState::Idle
    }

    /// Whether the current press has turned into a real move.
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Screen rectangle of the active box selection.
    pub fn selection_box(&self) -> Option<Bounds> {
        match self.state {
            GestureState::BoxSelecting { start, current } => {
                Some(Bounds::from_corners(start, current))
            }
            _ => None,
        }
    }

    /// The pan key was released: an active pan ends.
    pub fn release_pan_key(&mut self) -> bool {
        if matches!(self.state, GestureState::Panning { .. }) {
            self.reset();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.moved = false;
    }

    /// Handle a pointer event, returning zero or more mutations.
    ///
    /// `hit` is the topmost item under the pointer, if any.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        hit: Option<ItemId>,
        ctx: &GestureContext<'_>,
    ) -> Vec<CanvasMutation> {
        match event {
            InputEvent::PointerDown {
                x,
                y,
                button,
                modifiers,
            } => {
                self.reset();
                let p = Point::new(*x, *y);
                let wants_pan = *button == PointerButton::Middle
                    || (*button == PointerButton::Primary && ctx.pan_key_held);
                if wants_pan {
                    self.state = GestureState::Panning {
                        start: p,
                        start_offset: (ctx.view.offset_x, ctx.view.offset_y),
                    };
                    return vec![];
                }
                if *button != PointerButton::Primary {
                    return vec![];
                }

                let Some(id) = hit else {
                    self.state = GestureState::BoxSelecting {
                        start: p,
                        current: p,
                    };
                    return vec![CanvasMutation::ClearSelection];
                };

                let selected = ctx.selection.contains(id);
                let (mutations, moving): (Vec<CanvasMutation>, Vec<ItemId>) =
                    match (selected, modifiers.shift) {
                        (true, true) => {
                            return vec![CanvasMutation::RemoveFromSelection(id)];
                        }
                        (true, false) => (vec![], ctx.selection.iter().collect()),
                        (false, true) => {
                            let mut moving: Vec<ItemId> = ctx.selection.iter().collect();
                            moving.push(id);
                            (vec![CanvasMutation::AddToSelection(id)], moving)
                        }
                        (false, false) => (vec![CanvasMutation::SelectOnly(id)], vec![id]),
                    };

                let origins = ctx
                    .items
                    .iter()
                    .filter(|item| moving.contains(&item.id))
                    .map(|item| (item.id, item.position))
                    .collect();
                self.state = GestureState::DraggingItem { start: p, origins };
                mutations
            }

            InputEvent::PointerMove { x, y, .. } => {
                let p = Point::new(*x, *y);
                match &mut self.state {
                    GestureState::Idle => vec![],
                    GestureState::BoxSelecting { start, current } => {
                        *current = p;
                        let rect = Bounds::from_corners(*start, p);
                        let ids = hit_test_rect(ctx.items, ctx.view, &ctx.metrics, &rect);
                        vec![CanvasMutation::ReplaceSelection(ids)]
                    }
                    GestureState::Panning {
                        start,
                        start_offset,
                    } => {
                        let (dx, dy) = (p.x - start.x, p.y - start.y);
                        let (ox, oy) = *start_offset;
                        if !latch(&mut self.moved, dx, dy) {
                            return vec![];
                        }
                        vec![CanvasMutation::SetViewOffset {
                            offset_x: ox + dx,
                            offset_y: oy + dy,
                        }]
                    }
                    GestureState::DraggingItem { start, origins } => {
                        let (dx, dy) = (p.x - start.x, p.y - start.y);
                        if !latch(&mut self.moved, dx, dy) {
                            return vec![];
                        }
                        let (wx, wy) = (dx / ctx.view.scale, dy / ctx.view.scale);
                        origins
                            .iter()
                            .map(|(id, origin)| {
                                let mut position = Point::new(origin.x + wx, origin.y + wy);
                                if ctx.snap_to_grid {
                                    position = Point::new(snap(position.x), snap(position.y));
                                }
                                CanvasMutation::MoveItem { id: *id, position }
                            })
                            .collect()
                    }
                }
            }

            InputEvent::PointerUp { .. } => {
                if !self.is_idle() {
                    log::trace!("gesture end: {:?} moved={}", self.state, self.moved);
                }
                self.reset();
                vec![]
            }

            InputEvent::Wheel { .. } | InputEvent::Key { .. } => vec![],
        }
    }
}

/// Returns whether the move should be committed, latching once the
/// displacement exceeds the threshold.
fn latch(moved: &mut bool, dx: f64, dy: f64) -> bool {
    if !*moved && (dx.abs() > DRAG_THRESHOLD || dy.abs() > DRAG_THRESHOLD) {
        *moved = true;
    }
    *moved
}
