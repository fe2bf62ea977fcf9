use super::layer::{LayerId, PdkConfig};
use crate::geom::point::DbuPoint;
use crate::geom::rect::BBox;
use serde::{Deserialize, Serialize};

/// An M1/M2 via: two landing pads and a cut array, all relative to the via centre.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViaCell {
    pub bottom: LayerId,
    pub top: LayerId,
    pub cut_layer: LayerId,
    pub bottom_pad: BBox,
    pub top_pad: BBox,
    pub cuts: Vec<BBox>,
}

impl ViaCell {
    /// Builds a via whose pads enclose a `width` x `length` wire crossing by the
    /// configured enclosure on every side.
    pub fn m1m2(width: i64, length: i64, pdk: &PdkConfig) -> Self {
        let enclosure = pdk.units.to_dbu(pdk.via_enclosure);
        let cut = pdk.units.to_dbu(pdk.via_size);
        let spacing = pdk.units.to_dbu(pdk.via_spacing);
        let origin = DbuPoint::new(0, 0);

        let pad = BBox::from_center(origin, width + 2 * enclosure, length + 2 * enclosure);

        let cols = cut_count(pad.width() - 2 * enclosure, cut, spacing);
        let rows = cut_count(pad.height() - 2 * enclosure, cut, spacing);
        let array_w = cols * cut + (cols - 1) * spacing;
        let array_h = rows * cut + (rows - 1) * spacing;
        let x0 = -array_w / 2;
        let y0 = -array_h / 2;

        let mut cuts = Vec::with_capacity((rows * cols) as usize);
        for r in 0..rows {
            for c in 0..cols {
                let west = x0 + c * (cut + spacing);
                let south = y0 + r * (cut + spacing);
                cuts.push(BBox::new(south + cut, west + cut, south, west));
            }
        }

        Self {
            bottom: pdk.m1,
            top: pdk.m2,
            cut_layer: pdk.via,
            bottom_pad: pad,
            top_pad: pad,
            cuts,
        }
    }

    pub fn extent(&self) -> BBox {
        self.bottom_pad.union(&self.top_pad)
    }

    /// Union of both pads with the via placed at `center`.
    pub fn extent_at(&self, center: DbuPoint) -> BBox {
        let e = self.extent();
        BBox::new(
            e.north + center.y,
            e.east + center.x,
            e.south + center.y,
            e.west + center.x,
        )
    }
}

fn cut_count(span: i64, cut: i64, spacing: i64) -> i64 {
    if span <= cut {
        return 1;
    }
    ((span + spacing) / (cut + spacing)).max(1)
}
