/*
 * Created on Wed Jul 08 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! The concrete payload type the tree is keyed and queried on: an axis-aligned hitbox, ported
//! from `hitbox.hpp`. The tree itself is payload-agnostic (it stores `NonNull<P>` and never
//! dereferences them), but exposing a concrete type here is what makes `ball_query`'s magnitude
//! math and the integration tests meaningful.

/// An axis-aligned box in two dimensions: `(a1, b1)` is one corner, `(a2, b2)` the opposite one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    pub a1: f32,
    pub b1: f32,
    pub a2: f32,
    pub b2: f32,
}

impl Hitbox {
    pub fn new(a1: f32, b1: f32, a2: f32, b2: f32) -> Self {
        Self { a1, b1, a2, b2 }
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        ((self.a1 + self.a2) / 2.0, (self.b1 + self.b2) / 2.0)
    }

    /// Distance from the origin to the box's center, the key this payload would sort under in
    /// a tree organized for ball queries.
    pub fn magnitude(&self) -> f32 {
        let (x, y) = self.center();
        (x * x + y * y).sqrt()
    }

    /// Half the length of the box's diagonal: how far the box's furthest corner sits from its
    /// own center. Used by `ball_query` to widen the magnitude range enough to catch boxes whose
    /// center lies just outside a query ball but whose body still overlaps it.
    pub fn radius(&self) -> f32 {
        let (x, y) = self.center();
        let dx = self.a2 - x;
        let dy = self.b2 - y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_is_distance_to_center() {
        let h = Hitbox::new(0.0, 0.0, 6.0, 8.0);
        assert_eq!(h.center(), (3.0, 4.0));
        assert_eq!(h.magnitude(), 5.0);
    }
}
