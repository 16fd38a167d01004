use crate::model::{CanonicalRow, Category, EnrichedRow, Grade, Subject, Term};
use crate::text::{normalize_text, substitute_brackets};
use regex::Regex;
use std::sync::LazyLock;
#[allow(clippy::expect_used, reason = "literal pattern")]
static GRADE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([一二三四五六1-6])年级").expect("grade pattern"));
#[allow(clippy::expect_used, reason = "literal pattern")]
static GRADE_BEFORE_TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([一二三四五六])\(?[上下]").expect("grade/term pattern"));
#[allow(clippy::expect_used, reason = "literal pattern")]
static UPPER_TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"上册?|\(上\)").expect("upper term pattern"));
#[allow(clippy::expect_used, reason = "literal pattern")]
static LOWER_TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"下册?|\(下\)").expect("lower term pattern"));
#[allow(clippy::expect_used, reason = "literal pattern")]
static PAIRED_WITH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"配\s*([^)（）]+)").expect("paired-with pattern"));
const SUBJECT_KEYWORDS: &[(&str, Subject)] = &[
    ("道德与法治", Subject::MoralityAndLaw),
    ("语文", Subject::Chinese),
    ("数学", Subject::Math),
    ("英语", Subject::English),
    ("科学", Subject::Science),
    ("书法", Subject::Calligraphy),
    ("品德与社会", Subject::MoralityAndSociety),
    ("音乐", Subject::Music),
    ("美术", Subject::Art),
    ("信息技术", Subject::InformationTechnology),
    ("综合实践", Subject::ComprehensivePractice),
    ("体育与健康", Subject::PhysicalEducation),
    ("体育", Subject::PhysicalEducation),
];
const SUPPLEMENTARY_KEYWORDS: &[&str] = &[
    "教参",
    "教师用书",
    "学生活动手册",
    "练习",
    "光盘",
    "学具",
    "字典",
    "教案",
    "辅导",
    "同步",
    "导学",
    "训练",
];
const EXPLICIT_VERSIONS: &[&str] = &[
    "北师大版",
    "北师大",
    "人教版",
    "粤教版",
    "人音版",
    "人美版",
    "语文S版",
    "语文社S版",
];
const PUBLISHER_NAMES: &[&str] = &["湖南美术", "江苏教育", "粤教科技", "粤教育", "粤高教"];
const BNU: &str = "北师大";
const BNU_VERSION: &str = "北师大版";
pub fn parse_grade_and_term(title: Option<&str>) -> (Option<Grade>, Option<Term>) {
    let Some(raw) = title else {
        return (None, None);
    };
    let text = normalize_text(Some(raw));
    let grade =
        first_numeral(&GRADE_RE, &text).or_else(|| first_numeral(&GRADE_BEFORE_TERM_RE, &text));
    let term = if UPPER_TERM_RE.is_match(&text) {
        Some(Term::Upper)
    } else if LOWER_TERM_RE.is_match(&text) {
        Some(Term::Lower)
    } else {
        None
    };
    (grade, term)
}
fn first_numeral(re: &Regex, text: &str) -> Option<Grade> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .and_then(Grade::from_numeral)
}
pub fn parse_subject(title: Option<&str>) -> Option<Subject> {
    let text = title?;
    SUBJECT_KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|&(_, subject)| subject)
}
/// `None` only for non-text titles; a text title without keywords is a textbook.
pub fn parse_category(title: Option<&str>) -> Option<Category> {
    let text = title?;
    if SUPPLEMENTARY_KEYWORDS.iter().any(|k| text.contains(k)) {
        Some(Category::Supplementary)
    } else {
        Some(Category::Textbook)
    }
}
pub fn parse_version(title: Option<&str>, fallback: Option<&str>) -> Option<String> {
    let Some(raw) = title else {
        return fallback.map(str::to_owned);
    };
    let text = substitute_brackets(raw);
    if let Some(token) = EXPLICIT_VERSIONS.iter().find(|token| text.contains(*token)) {
        return Some(if *token == BNU { BNU_VERSION } else { *token }.to_owned());
    }
    if let Some(clause) = PAIRED_WITH_RE.captures(&text).and_then(|caps| caps.get(1)) {
        let version = clause.as_str().trim();
        return Some(if version.contains(BNU) { BNU_VERSION } else { version }.to_owned());
    }
    if let Some(publisher) = PUBLISHER_NAMES.iter().find(|name| text.contains(*name)) {
        return Some((*publisher).to_owned());
    }
    fallback.map(str::to_owned)
}
pub fn enrich(row: CanonicalRow) -> EnrichedRow {
    let title = row.title.as_text();
    let (grade, term) = parse_grade_and_term(title);
    let subject = parse_subject(title);
    let category = parse_category(title);
    let version = parse_version(title, row.publisher_label.as_deref());
    EnrichedRow {
        row,
        grade,
        term,
        subject,
        category,
        version,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;
    #[test]
    fn grade_and_term_from_grade_word() {
        assert_eq!(
            parse_grade_and_term(Some("三年级语文上册")),
            (Some(Grade::Three), Some(Term::Upper))
        );
    }
    #[test]
    fn grade_and_term_absent_without_markers() {
        assert_eq!(parse_grade_and_term(Some("英语练习")), (None, None));
    }
    #[test]
    fn grade_from_numeral_before_bracketed_term() {
        assert_eq!(
            parse_grade_and_term(Some("五（上）数学")),
            (Some(Grade::Five), Some(Term::Upper))
        );
        assert_eq!(
            parse_grade_and_term(Some("五(上)数学")),
            (Some(Grade::Five), Some(Term::Upper))
        );
    }
    #[test]
    fn grade_from_ascii_digit() {
        assert_eq!(
            parse_grade_and_term(Some("英语4年级下册")),
            (Some(Grade::Four), Some(Term::Lower))
        );
    }
    #[test]
    fn grade_fallback_uses_numeral_directly_before_term() {
        assert_eq!(
            parse_grade_and_term(Some("数学二下")),
            (Some(Grade::Two), Some(Term::Lower))
        );
    }
    #[test]
    fn grade_word_wins_over_fallback() {
        assert_eq!(
            parse_grade_and_term(Some("一上配套六年级")).0,
            Some(Grade::Six)
        );
    }
    #[test]
    fn term_without_grade_and_grade_without_term() {
        assert_eq!(parse_grade_and_term(Some("语文下册")), (None, Some(Term::Lower)));
        assert_eq!(parse_grade_and_term(Some("三年级美术")), (Some(Grade::Three), None));
    }
    #[test]
    fn upper_term_checked_before_lower() {
        assert_eq!(parse_grade_and_term(Some("上下册合订")).1, Some(Term::Upper));
    }
    #[test]
    fn seven_is_not_a_grade() {
        assert_eq!(parse_grade_and_term(Some("7年级数学")).0, None);
    }
    #[test]
    fn non_text_title_has_no_grade_or_term() {
        assert_eq!(parse_grade_and_term(None), (None, None));
    }
    #[test]
    fn subject_health_variant_maps_to_pe() {
        assert_eq!(parse_subject(Some("体育与健康")), Some(Subject::PhysicalEducation));
        assert_eq!(parse_subject(Some("体育三年级")), Some(Subject::PhysicalEducation));
        assert_eq!(
            parse_subject(Some("体育与健康")).map(Subject::name),
            Some("体育")
        );
    }
    #[test]
    fn subject_practice_activity_book() {
        assert_eq!(
            parse_subject(Some("综合实践活动手册")),
            Some(Subject::ComprehensivePractice)
        );
    }
    #[test]
    fn subject_list_order_is_authoritative() {
        assert_eq!(parse_subject(Some("数学语文综合")), Some(Subject::Chinese));
        assert_eq!(parse_subject(Some("手工")), None);
        assert_eq!(parse_subject(None), None);
    }
    #[test]
    fn category_keywords() {
        assert_eq!(parse_category(Some("同步练习册")), Some(Category::Supplementary));
        assert_eq!(parse_category(Some("语文")), Some(Category::Textbook));
        assert_eq!(parse_category(None), None);
    }
    #[test]
    fn version_explicit_token() {
        assert_eq!(
            parse_version(Some("数学（北师大版）三年级上"), Some("X")).as_deref(),
            Some("北师大版")
        );
        assert_eq!(
            parse_version(Some("数学北师大三年级"), Some("X")).as_deref(),
            Some("北师大版")
        );
    }
    #[test]
    fn version_explicit_token_preempts_paired_clause_in_both_orders() {
        assert_eq!(
            parse_version(Some("配人教版教材"), Some("X")).as_deref(),
            Some("人教版")
        );
        assert_eq!(
            parse_version(Some("练习册(配湘教版)人美版"), Some("X")).as_deref(),
            Some("人美版")
        );
        assert_eq!(
            parse_version(Some("人教版练习(配湘教版)"), Some("X")).as_deref(),
            Some("人教版")
        );
    }
    #[test]
    fn version_paired_clause() {
        assert_eq!(
            parse_version(Some("同步练习（配 湘教版 ）"), Some("X")).as_deref(),
            Some("湘教版")
        );
        assert_eq!(
            parse_version(Some("导学案配粤高教版"), None).as_deref(),
            Some("粤高教版")
        );
    }
    #[test]
    fn version_publisher_name() {
        assert_eq!(
            parse_version(Some("美术湖南美术出版社"), Some("X")).as_deref(),
            Some("湖南美术")
        );
    }
    #[test]
    fn version_falls_back() {
        assert_eq!(parse_version(Some("语文"), Some("X")).as_deref(), Some("X"));
        assert_eq!(parse_version(Some("语文"), None), None);
        assert_eq!(parse_version(None, Some("Y")).as_deref(), Some("Y"));
    }
    #[test]
    fn enrich_fills_every_field() {
        let row = CanonicalRow {
            title: CellValue::Text("三年级数学同步练习（配人教版）".to_owned()),
            publisher_label: Some("人民教育".to_owned()),
            unit_price: 9.5,
            paid_quantity: 3,
            free_quantity: 2,
        };
        let enriched = enrich(row);
        assert_eq!(enriched.grade, Some(Grade::Three));
        assert_eq!(enriched.term, None);
        assert_eq!(enriched.subject, Some(Subject::Math));
        assert_eq!(enriched.category, Some(Category::Supplementary));
        assert_eq!(enriched.version.as_deref(), Some("人教版"));
        assert_eq!(enriched.total_quantity(), 5);
    }
}
