//! Post-route verification of the geometric properties every route must hold.

use crate::db::core::Obstruction;
use crate::db::indices::GroupId;
use crate::db::layer::LayerId;
use crate::db::port::Dir;
use crate::db::route::{RouteResult, ViaRole};
use crate::geom::rect::BBox;
use crate::geom::rtree::SpatialIndex;
use rayon::prelude::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Spacing rules a finished route is held to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteRules {
    /// Rectangles shorter than this along their run are an error, in DBU.
    pub min_segment_length: i64,
    /// Gap required between route metal and an obstruction on the same layer.
    pub clearance: i64,
    /// Endpoint areas where only overlap is checked, not spacing.
    pub windows: Vec<BBox>,
}

impl RouteRules {
    /// True if `metal` overlaps `obstruction`, or comes closer than the
    /// clearance somewhere no window fully covers.
    pub fn violates(&self, metal: &BBox, obstruction: &BBox) -> bool {
        if metal.intersects(obstruction) {
            return true;
        }
        match metal.inflate(self.clearance).intersection(obstruction) {
            Some(gap) => !self.windows.iter().any(|w| w.encloses(&gap)),
            None => false,
        }
    }
}

/// Checks one route against the obstructions it had to avoid.
///
/// `obstructions` must already exclude the polygons exempted at the endpoints.
pub fn verify_route(
    route: &RouteResult,
    obstructions: &[Obstruction],
    rules: &RouteRules,
) -> Result<(), String> {
    let corners = &route.corners;
    if corners.len() < 2 {
        return Err(format!("Net '{}': fewer than two corners", route.net));
    }

    for (i, pair) in corners.windows(2).enumerate() {
        if !pair[0].is_aligned(&pair[1]) || pair[0] == pair[1] {
            return Err(format!(
                "Net '{}': segment {} from {:?} to {:?} is not Manhattan",
                route.net, i, pair[0], pair[1]
            ));
        }
    }

    for (i, triple) in corners.windows(3).enumerate() {
        let a = Dir::between(triple[0], triple[1]);
        let b = Dir::between(triple[1], triple[2]);
        if a.is_some() && (a == b || a.map(Dir::opposite) == b) {
            return Err(format!(
                "Net '{}': corners {}..{} run in one line",
                route.net,
                i,
                i + 2
            ));
        }
    }

    if corners[0] != route.source.center || corners[corners.len() - 1] != route.sink.center {
        return Err(format!(
            "Net '{}': route ends {:?}..{:?} do not meet ports {:?}..{:?}",
            route.net,
            corners[0],
            corners[corners.len() - 1],
            route.source.center,
            route.sink.center
        ));
    }

    for rect in &route.rects {
        let expected = route.scheme.layer_for(rect.horizontal);
        if rect.layer != expected {
            return Err(format!(
                "Net '{}': rectangle {:?} drawn on {} instead of {}",
                route.net, rect.bbox, rect.layer, expected
            ));
        }
        let length = if rect.horizontal {
            rect.bbox.width()
        } else {
            rect.bbox.height()
        };
        if length < rules.min_segment_length {
            return Err(format!(
                "Net '{}': rectangle {:?} shorter than {} dbu",
                route.net, rect.bbox, rules.min_segment_length
            ));
        }
    }

    if route.scheme.corner_vias {
        let expected = expected_via_count(route);
        if route.vias.len() != expected {
            return Err(format!(
                "Net '{}': {} vias emitted, {} expected",
                route.net,
                route.vias.len(),
                expected
            ));
        }
    } else if route.corner_via_count() != 0 {
        return Err(format!(
            "Net '{}': corner vias emitted on a single-layer route",
            route.net
        ));
    }

    check_clearance(route, obstructions, rules)
}

/// Interior corners plus one cap per port whose layer differs from the wire.
pub fn expected_via_count(route: &RouteResult) -> usize {
    let corners = &route.corners;
    let n = corners.len();
    if n < 2 {
        return 0;
    }
    let interior = if route.scheme.corner_vias {
        n.saturating_sub(2)
    } else {
        0
    };
    let first = route.scheme.layer_for(corners[0].y == corners[1].y);
    let last = route.scheme.layer_for(corners[n - 2].y == corners[n - 1].y);
    interior
        + usize::from(route.source.layer != first)
        + usize::from(route.sink.layer != last)
}

fn check_clearance(
    route: &RouteResult,
    obstructions: &[Obstruction],
    rules: &RouteRules,
) -> Result<(), String> {
    let index = SpatialIndex::from_rects(obstructions.iter().enumerate().map(|(i, o)| (o.bbox, i)));
    let failure: Mutex<Option<String>> = Mutex::new(None);
    let failed = AtomicBool::new(false);

    route.rects.par_iter().for_each(|rect| {
        if failed.load(Ordering::Relaxed) {
            return;
        }
        if let Some(hit) = index
            .query(rect.bbox.inflate(rules.clearance))
            .into_iter()
            .find(|&i| {
                obstructions[i].layer == rect.layer
                    && rules.violates(&rect.bbox, &obstructions[i].bbox)
            })
        {
            if !failed.swap(true, Ordering::Relaxed) {
                if let Ok(mut slot) = failure.lock() {
                    *slot = Some(format!(
                        "Net '{}': wire {:?} on {} breaks clearance to obstruction {:?}",
                        route.net, rect.bbox, rect.layer, obstructions[hit].bbox
                    ));
                }
            }
        }
    });

    let via_layers: [LayerId; 2] = [route.scheme.horizontal, route.scheme.vertical];
    for via in &route.vias {
        if via.role != ViaRole::Corner {
            continue;
        }
        if let Some(hit) = index
            .query(via.pad.inflate(rules.clearance))
            .into_iter()
            .find(|&i| {
                via_layers.contains(&obstructions[i].layer)
                    && rules.violates(&via.pad, &obstructions[i].bbox)
            })
        {
            return Err(format!(
                "Net '{}': via at {:?} breaks clearance to obstruction {:?}",
                route.net, via.center, obstructions[hit].bbox
            ));
        }
    }

    match failure.into_inner() {
        Ok(Some(msg)) => Err(msg),
        _ => Ok(()),
    }
}

/// Checks that no two routes of different electrical groups share metal.
pub fn check_nets_disjoint(routes: &[(GroupId, &RouteResult)]) -> Result<(), String> {
    let pairs: Vec<(usize, usize)> = (0..routes.len())
        .flat_map(|i| ((i + 1)..routes.len()).map(move |j| (i, j)))
        .filter(|&(i, j)| routes[i].0 != routes[j].0)
        .collect();

    let short = pairs.par_iter().find_map_first(|&(i, j)| {
        let (a, b) = (routes[i].1, routes[j].1);
        for ra in &a.rects {
            for rb in &b.rects {
                if ra.layer == rb.layer && ra.bbox.intersects(&rb.bbox) {
                    return Some(format!(
                        "SHORT: '{}' vs '{}' on {} at {:?}",
                        a.net, b.net, ra.layer, ra.bbox
                    ));
                }
            }
        }
        None
    });

    match short {
        Some(msg) => {
            log::error!("{}", msg);
            Err(msg)
        }
        None => Ok(()),
    }
}
