use crate::domain::DatasetDescription;

pub const README_FILE: &str = "README.md";

pub fn readme_content(dataset: &DatasetDescription) -> String {
    format!(
        "# {}\n\nCrawled from [OSF]({})\n\n## Description\n\n{}",
        dataset.title, dataset.homepage, dataset.description
    )
}
