pub mod command;
pub mod conditions;
pub mod layout;
pub mod render;

pub mod errors {
    use siteplan_core::site::ValidationError;
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    pub enum EngineError {
        #[error("invalid sheet input: {0}")]
        Validation(#[from] ValidationError),
        #[error("drawing scale must be a positive finite denominator, got {0}")]
        InvalidScale(f64),
        #[error("sheet template is unusable: {0}")]
        InvalidTemplate(String),
    }
}

pub mod session {
    use image::DynamicImage;
    use siteplan_core::canvas::DrawingCanvas;
    use siteplan_core::keyplan::KeyPlanSource;
    use siteplan_core::site::{GeoPoint, Road, SheetForm, Side};
    use tracing::{debug, info};

    use crate::errors::EngineError;
    use crate::layout::{SheetLayout, SheetTemplate, compute_layout};
    use crate::render::SheetRenderer;

    /// 一次生成的产物：布局、画布与下载文件名。
    #[derive(Debug, Clone)]
    pub struct GeneratedSheet {
        pub layout: SheetLayout,
        pub canvas: DrawingCanvas,
        pub file_name: String,
    }

    /// 单用户会话：保存表单、可选草图与地图点选位置。
    /// 只有位置在多次生成之间保留，其余每次重新计算。
    #[derive(Debug, Clone, Default)]
    pub struct Session {
        form: SheetForm,
        sketch: Option<DynamicImage>,
        location: Option<GeoPoint>,
    }

    impl Session {
        pub fn new(form: SheetForm) -> Self {
            Self {
                form,
                sketch: None,
                location: None,
            }
        }

        #[inline]
        pub fn form(&self) -> &SheetForm {
            &self.form
        }

        #[inline]
        pub fn location(&self) -> Option<GeoPoint> {
            self.location
        }

        /// 记录一次地图点选。后一次总是覆盖前一次，返回被覆盖的位置。
        pub fn pick_location(&mut self, point: GeoPoint) -> Option<GeoPoint> {
            let previous = self.location.replace(point);
            info!(location = %point, "已设置场地位置");
            previous
        }

        pub fn clear_location(&mut self) -> Option<GeoPoint> {
            self.location.take()
        }

        pub fn set_road(&mut self, side: Side, road: Road) {
            self.form.roads.set(side, road);
        }

        #[inline]
        pub fn sketch(&self) -> Option<&DynamicImage> {
            self.sketch.as_ref()
        }

        pub fn set_sketch(&mut self, sketch: Option<DynamicImage>) {
            self.sketch = sketch;
        }

        /// 校验表单、计算布局、按需拉取关键位置图并绘制整张图纸。
        pub fn generate(
            &self,
            template: &SheetTemplate,
            renderer: &SheetRenderer,
            key_plans: &dyn KeyPlanSource,
        ) -> Result<GeneratedSheet, EngineError> {
            let layout = compute_layout(&self.form, template)?;
            let key_plan = self.location.map(|point| key_plans.key_plan(point));
            let canvas = renderer.render(&self.form, &layout, key_plan.as_ref(), self.sketch.as_ref());
            let file_name = self.form.download_file_name();
            debug!(
                %file_name,
                location = self.location.is_some(),
                primitives = canvas.len(),
                "图纸生成完成"
            );
            Ok(GeneratedSheet {
                layout,
                canvas,
                file_name,
            })
        }
    }

}
