//! DOM domain operations keyed by remote object id.

use std::path::PathBuf;

use serde_json::json;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::BoxModel;

use super::core::PageSession;

impl PageSession {
    /// Box model of an element, `None` when it has no layout box.
    pub async fn box_model(&self, object_id: &str) -> Result<Option<BoxModel>, CdpError> {
        let result = self
            .call("DOM.getBoxModel", Some(json!({"objectId": object_id})))
            .await;

        match result {
            Ok(value) => Ok(Some(serde_json::from_value(value["model"].clone())?)),
            Err(CdpError::Protocol { code: -32000, ref message })
                if message.contains("Could not compute box model") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Center of the element's content quad.
    pub async fn element_center(&self, object_id: &str) -> Result<Option<(f64, f64)>, CdpError> {
        Ok(self
            .box_model(object_id)
            .await?
            .filter(|model| model.width > 0 || model.height > 0)
            .map(|model| Self::quad_center(&model.content)))
    }

    pub async fn scroll_into_view_if_needed(&self, object_id: &str) -> Result<(), CdpError> {
        self.call(
            "DOM.scrollIntoViewIfNeeded",
            Some(json!({"objectId": object_id})),
        )
        .await?;
        Ok(())
    }

    /// Attach local files to an `<input type=file>`.
    pub async fn set_file_input_files(
        &self,
        object_id: &str,
        files: &[PathBuf],
    ) -> Result<(), CdpError> {
        let files: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        self.call(
            "DOM.setFileInputFiles",
            Some(json!({"objectId": object_id, "files": files})),
        )
        .await?;
        Ok(())
    }

    pub(crate) fn quad_center(quad: &[f64]) -> (f64, f64) {
        if quad.len() >= 8 {
            let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
            let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
            (x, y)
        } else {
            (0.0, 0.0)
        }
    }
}
