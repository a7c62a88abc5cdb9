//! 审批条件与附注的固定文本，以及多栏分行排布。

use siteplan_core::geometry::{Point2, Rect};
use siteplan_core::style::FontFace;
use siteplan_core::text;

pub const CONDITIONS_HEADING: &str = "GENERAL CONDITIONS OF APPROVAL";
pub const NOTE_HEADING: &str = "NOTE";

pub const GENERAL_CONDITIONS: [&str; 15] = [
    "1. The single plot layout plan is approved based on the survey sketch certified by the Assistant Director of Land Records.",
    "2. Building construction shall be undertaken only after obtaining approval for the building plan from the city corporation as per the approved single site layout plan.",
    "3. The existing width of road abutting the site in question is marked in the plan. At the time of building plan approval the authority approving the building plan shall allow the maximum FAR permissible considering the minimum width of the road at any stretch towards any one side which shall join a road of equal or higher width.",
    "4. The owner shall provide drinking water, waste water discharge system and drainage system for the site in question. During the building plan approval the owner shall submit a design to implement the rain water harvesting to collect the rain water from the entire site area.",
    "5. Approval of single site layout plan shall not be a document to claim title to the property. In case of pending cases under the Land Reforms Act/Section 136(3) of the Land Revenue Act, 1964, approval of single site layout plan shall be subject to final order. The applicant shall be bound by the final order of the court in this regard and in no case the fees paid for the approval of the single site layout plan will be refunded.",
    "6. If it is found that the land proposed by the applicant includes any land belonging to the Government or any other private land, in such a case, the Authority reserves the rights to modify the single site layout plan or to withdraw the plan.",
    "7. If it is proved that the applicant has provided any false documents or forged documents for the plan sanction, the plan sanction shall stand canceled automatically.",
    "8. The applicant shall be bound to all subsequent orders and the decision relating to payment of fees as required by the Authority.",
    "9. Adequate provisions shall be made to segregate wet waste, dry waste and plastics. Area should be reserved for composting of wet waste, dry waste etc.",
    "10. No Objection Certificates/Approvals for the building plan should be obtained from the competent authorities prior to construction of building on the approved single site.",
    "11. Sewage shall not be discharged into open spaces/vacant areas but should be reused for gardening, cleaning of common areas and various other uses.",
    "12. If the owner wishes to modify the single site layout approval to multi-plot residential layout, the owner shall submit a request to the Greater Bengaluru Authority and obtain approval for the multi-plot residential layout plan as per the zoning regulations.",
    "13. One tree for every 240.0 sq.m of the total floor area shall be planted and nurtured at the site in question.",
    "14. Prior permission should be obtained from the competent authority before constructing a culvert on the storm water drain between the land in question and the existing road attached to it if any.",
    "15. To abide by such other conditions as may be imposed by the Authority from time to time.",
];

pub const NOTES: [&str; 4] = [
    "1. The single plot plan is issued under the provisions of section 17 of KTCP Act 1961.",
    "2. The applicant has remitted fees of Rs.******* vide challan No. ********* Dated : **.**.****.",
    "3. The applicant has to abide by the conditions imposed in the single plot plan approval order.",
    "4. This single plot plan is issued vide number ***/***/***-******* dated : **.**.****.",
];

/// 排好的一行文字，`anchor` 为行带左上角。
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLine {
    pub anchor: Point2,
    pub content: String,
    pub font: FontFace,
    pub size_pt: f64,
}

/// 按固定行高自上而下填充各栏，栏底用尽后转入下一栏顶部。
#[derive(Debug)]
pub struct ColumnFlow<'a> {
    columns: &'a [Rect],
    column: usize,
    cursor_y: f64,
    lines: Vec<FlowLine>,
    overflow: Vec<String>,
}

impl<'a> ColumnFlow<'a> {
    pub fn new(columns: &'a [Rect]) -> Self {
        let cursor_y = columns.first().map(Rect::top).unwrap_or_default();
        Self {
            columns,
            column: 0,
            cursor_y,
            lines: Vec::new(),
            overflow: Vec::new(),
        }
    }

    /// 当前栏宽，所有栏用尽后返回 0。
    pub fn column_width(&self) -> f64 {
        self.columns
            .get(self.column)
            .map(Rect::width)
            .unwrap_or_default()
    }

    /// 放入一行，行带高度由字号决定。无处可放时记入溢出。
    pub fn push_line(&mut self, content: impl Into<String>, font: FontFace, size_pt: f64) {
        let content = content.into();
        let band = text::line_height_mm(size_pt);
        while let Some(column) = self.columns.get(self.column) {
            if self.cursor_y - band >= column.bottom() - 1e-9 {
                self.lines.push(FlowLine {
                    anchor: Point2::new(column.left(), self.cursor_y),
                    content,
                    font,
                    size_pt,
                });
                self.cursor_y -= band;
                return;
            }
            self.advance_column();
        }
        self.overflow.push(content);
    }

    /// 换行排入一段文字，按当前栏宽实测断行。
    pub fn push_paragraph(&mut self, paragraph: &str, font: FontFace, size_pt: f64) {
        let width = self.column_width();
        for line in text::wrap_to_width(paragraph, font, size_pt, width) {
            self.push_line(line, font, size_pt);
        }
    }

    /// 空出一个行带，位于栏顶时不占位。
    pub fn skip(&mut self, size_pt: f64) {
        let at_top = self
            .columns
            .get(self.column)
            .is_some_and(|column| (column.top() - self.cursor_y).abs() < 1e-9);
        if !at_top {
            self.cursor_y -= text::line_height_mm(size_pt);
        }
    }

    fn advance_column(&mut self) {
        self.column += 1;
        if let Some(next) = self.columns.get(self.column) {
            self.cursor_y = next.top();
        }
    }

    pub fn finish(self) -> (Vec<FlowLine>, Vec<String>) {
        (self.lines, self.overflow)
    }
}

/// 排布全部条款与附注。
pub fn flow_conditions(
    columns: &[Rect],
    body_pt: f64,
    note_heading_pt: f64,
    note_pt: f64,
) -> (Vec<FlowLine>, Vec<String>) {
    let mut flow = ColumnFlow::new(columns);
    for clause in GENERAL_CONDITIONS {
        flow.push_paragraph(clause, FontFace::Regular, body_pt);
    }
    flow.skip(body_pt);
    flow.push_line(NOTE_HEADING, FontFace::Bold, note_heading_pt);
    for note in NOTES {
        flow.push_paragraph(note, FontFace::Regular, note_pt);
    }
    flow.finish()
}
