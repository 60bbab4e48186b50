// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// branch_predictor.rs
//
// This file contains the branch prediction interface used by Branch
// functional units, and the static per-direction predictor. Forward and
// backward branches each carry their own taken/not-taken policy.

use std::fmt;

use serde::Deserialize;

/// Speculation policy for one branch direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecPolicy {
    Taken,
    NotTaken,
}

/// Interface between a Branch unit and the model backing its
/// predictions. Dynamic predictors slot in behind this trait.
pub trait BranchPredictor: fmt::Debug {
    /// Predict whether the branch at `pc` targeting `dest` is taken.
    fn predict(&self, pc: usize, dest: usize) -> bool;

    /// Notify the predictor of a resolved branch outcome.
    fn update(&mut self, taken: bool);
}

/// Static predictor: a branch is forward when its target lies past the
/// branch itself, and each direction follows its configured policy.
#[derive(Debug, Clone)]
pub struct StaticPredictor {
    pub forward: SpecPolicy,
    pub backward: SpecPolicy,
}

impl Default for StaticPredictor {
    fn default() -> Self {
        Self {
            forward: SpecPolicy::NotTaken,
            backward: SpecPolicy::Taken,
        }
    }
}

impl BranchPredictor for StaticPredictor {
    fn predict(&self, pc: usize, dest: usize) -> bool {
        let forward_branch = dest > pc;
        if forward_branch {
            self.forward == SpecPolicy::Taken
        } else {
            self.backward == SpecPolicy::Taken
        }
    }

    fn update(&mut self, _taken: bool) {
        // The static policy never learns from outcomes.
    }
}
