use std::fmt;
/// A raw spreadsheet cell as the pipeline sees it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}
impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v.as_str()),
            Self::Empty | Self::Number(_) => None,
        }
    }
    pub fn as_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(v) => v.clone(),
            Self::Number(v) => format_number(*v),
        }
    }
    pub const fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(_) | Self::Number(_) => false,
        }
    }
}
pub fn format_number(v: f64) -> String {
    const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;
    if v.fract().abs() < f64::EPSILON && v.abs() <= EXACT_INTEGER_LIMIT {
        if v == 0.0 {
            "0".to_owned()
        } else {
            format!("{v:.0}")
        }
    } else {
        format!("{v}")
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    ShipmentDetail,
    SupplementCatalog,
    FreeTextbookCatalog,
    StandardStatistics,
}
impl SourceFormat {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ShipmentDetail => "发货单明细",
            Self::SupplementCatalog => "小学教辅目录",
            Self::FreeTextbookCatalog => "免费教材征订目录",
            Self::StandardStatistics => "订数统计表",
        }
    }
    /// 0-based row of the header line within the raw sheet.
    pub const fn header_row(self) -> usize {
        match self {
            Self::ShipmentDetail | Self::SupplementCatalog => 1,
            Self::FreeTextbookCatalog => 2,
            Self::StandardStatistics => 0,
        }
    }
}
impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
}
impl Grade {
    pub const fn label(self) -> &'static str {
        match self {
            Self::One => "一年级",
            Self::Two => "二年级",
            Self::Three => "三年级",
            Self::Four => "四年级",
            Self::Five => "五年级",
            Self::Six => "六年级",
        }
    }
    pub const fn rank(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
        }
    }
    /// Accepts the Chinese numerals 一..六 and the ASCII digits 1..6.
    pub const fn from_numeral(ch: char) -> Option<Self> {
        match ch {
            '一' | '1' => Some(Self::One),
            '二' | '2' => Some(Self::Two),
            '三' | '3' => Some(Self::Three),
            '四' | '4' => Some(Self::Four),
            '五' | '5' => Some(Self::Five),
            '六' | '6' => Some(Self::Six),
            _ => None,
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Upper,
    Lower,
}
impl Term {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upper => "上学期",
            Self::Lower => "下学期",
        }
    }
}
/// 科目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    /// 道德与法治
    MoralityAndLaw,
    /// 语文
    Chinese,
    /// 数学
    Math,
    /// 英语
    English,
    /// 科学
    Science,
    /// 书法
    Calligraphy,
    /// 品德与社会
    MoralityAndSociety,
    /// 音乐
    Music,
    /// 美术
    Art,
    /// 信息技术
    InformationTechnology,
    /// 综合实践
    ComprehensivePractice,
    /// 体育（含体育与健康）
    PhysicalEducation,
}
impl Subject {
    pub const fn name(self) -> &'static str {
        match self {
            Self::MoralityAndLaw => "道德与法治",
            Self::Chinese => "语文",
            Self::Math => "数学",
            Self::English => "英语",
            Self::Science => "科学",
            Self::Calligraphy => "书法",
            Self::MoralityAndSociety => "品德与社会",
            Self::Music => "音乐",
            Self::Art => "美术",
            Self::InformationTechnology => "信息技术",
            Self::ComprehensivePractice => "综合实践",
            Self::PhysicalEducation => "体育",
        }
    }
}
impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Textbook,
    Supplementary,
}
impl Category {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Textbook => "教材",
            Self::Supplementary => "教辅",
        }
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub title: CellValue,
    pub publisher_label: Option<String>,
    pub unit_price: f64,
    pub paid_quantity: u32,
    pub free_quantity: u32,
}
impl CanonicalRow {
    pub const fn total_quantity(&self) -> u32 {
        self.paid_quantity.saturating_add(self.free_quantity)
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub row: CanonicalRow,
    pub grade: Option<Grade>,
    pub term: Option<Term>,
    pub subject: Option<Subject>,
    pub category: Option<Category>,
    pub version: Option<String>,
}
impl EnrichedRow {
    pub const fn total_quantity(&self) -> u32 {
        self.row.total_quantity()
    }
}
