// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON dump of the full document model.

use satzwerk_core::{DocumentModel, Result};

use super::DocumentAssembler;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAssembler;

impl DocumentAssembler for JsonAssembler {
    fn assemble(&self, model: &DocumentModel) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(model)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
