//! 取得計画（郡 × 月）と、ダウンロードファイルの対応付け規則

use chrono::Month;

use crate::error::ScraperError;

/// 月名を解析（大文字小文字不問、3文字略称も可）
pub fn parse_month(name: &str) -> Result<Month, ScraperError> {
    name.trim()
        .parse::<Month>()
        .map_err(|_| ScraperError::Config(format!("不明な月名: {}", name)))
}

/// 暦順に並べ替え
pub fn sort_months(months: &mut [Month]) {
    months.sort_by_key(|m| m.number_from_month());
}

/// 大文字小文字を区別した辞書順
pub fn sort_counties(counties: &mut [String]) {
    counties.sort();
}

/// データJSONのキー: `"<年><月序数>"`（ゼロ埋めなし）
pub fn data_key(year: i32, month: Month) -> String {
    format!("{}{}", year, month.number_from_month())
}

/// Chromeの連番命名規則に従ったファイル名
pub fn positional_file_name(county_index: usize, month_index: usize, month_count: usize) -> String {
    let index = county_index * month_count + month_index;
    if index == 0 {
        "data.json".to_string()
    } else {
        format!("data ({}).json", index)
    }
}

/// 1回分の取得タスク
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub county_index: usize,
    pub month_index: usize,
    pub county: String,
    pub month: Month,
}

/// ソート済みの郡・月リスト
#[derive(Debug, Clone)]
pub struct FetchPlan {
    counties: Vec<String>,
    months: Vec<Month>,
}

impl FetchPlan {
    pub fn new(mut counties: Vec<String>, mut months: Vec<Month>) -> Self {
        sort_counties(&mut counties);
        sort_months(&mut months);
        Self { counties, months }
    }

    pub fn counties(&self) -> &[String] {
        &self.counties
    }

    pub fn months(&self) -> &[Month] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.counties.len() * self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// ダウンロード順（郡が外側、月が内側）
    pub fn tasks(&self) -> impl Iterator<Item = FetchTask> + '_ {
        self.counties
            .iter()
            .enumerate()
            .flat_map(move |(county_index, county)| {
                self.months
                    .iter()
                    .enumerate()
                    .map(move |(month_index, month)| FetchTask {
                        county_index,
                        month_index,
                        county: county.clone(),
                        month: *month,
                    })
            })
    }

    pub fn positional_file_name(&self, task: &FetchTask) -> String {
        positional_file_name(task.county_index, task.month_index, self.months.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_file_name() {
        assert_eq!(positional_file_name(0, 0, 3), "data.json");
        assert_eq!(positional_file_name(0, 1, 3), "data (1).json");
        assert_eq!(positional_file_name(1, 0, 3), "data (3).json");
        assert_eq!(positional_file_name(2, 2, 3), "data (8).json");
        assert_eq!(positional_file_name(5, 0, 1), "data (5).json");
    }

    #[test]
    fn test_sort_months_by_calendar() {
        let mut months = vec![
            parse_month("March").unwrap(),
            parse_month("January").unwrap(),
        ];
        sort_months(&mut months);
        assert_eq!(months, vec![Month::January, Month::March]);
    }

    #[test]
    fn test_sort_counties_case_sensitive() {
        let mut counties = vec!["Yolo".to_string(), "Alameda".to_string()];
        sort_counties(&mut counties);
        assert_eq!(counties, vec!["Alameda", "Yolo"]);

        let mut mixed = vec!["alpine".to_string(), "Butte".to_string()];
        sort_counties(&mut mixed);
        assert_eq!(mixed, vec!["Butte", "alpine"]);
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("december").unwrap(), Month::December);
        assert_eq!(parse_month("DECEMBER").unwrap(), Month::December);
        assert_eq!(parse_month("Jan").unwrap(), Month::January);
        assert!(matches!(parse_month("Smarch"), Err(ScraperError::Config(_))));
    }

    #[test]
    fn test_data_key() {
        assert_eq!(data_key(1985, Month::January), "19851");
        assert_eq!(data_key(2023, Month::December), "202312");
    }

    #[test]
    fn test_tasks_are_county_major() {
        let plan = FetchPlan::new(
            vec!["Yolo".into(), "Alameda".into()],
            vec![Month::March, Month::January],
        );
        let tasks: Vec<_> = plan
            .tasks()
            .map(|t| {
                let index = plan_index(&t);
                (t.county, t.month, index)
            })
            .collect();

        assert_eq!(
            tasks,
            vec![
                ("Alameda".to_string(), Month::January, 0),
                ("Alameda".to_string(), Month::March, 1),
                ("Yolo".to_string(), Month::January, 2),
                ("Yolo".to_string(), Month::March, 3),
            ]
        );
        assert_eq!(plan.len(), 4);
    }

    fn plan_index(task: &FetchTask) -> usize {
        task.county_index * 2 + task.month_index
    }
}
