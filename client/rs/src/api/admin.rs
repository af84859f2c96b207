use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
  Batch, BatchStatus, Site, UploadedFile,
};

/// Page selector accepted by every admin list endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
  /// Zero-based.
  pub page: i64,
  /// Defaults to 50, capped at 500.
  pub page_size: Option<i64>,
}

impl Pagination {
  pub const DEFAULT_PAGE_SIZE: i64 = 50;
  pub const MAX_PAGE_SIZE: i64 = 500;

  pub fn limit(&self) -> i64 {
    self
      .page_size
      .unwrap_or(Self::DEFAULT_PAGE_SIZE)
      .clamp(1, Self::MAX_PAGE_SIZE)
  }

  pub fn offset(&self) -> i64 {
    self.page.max(0) * self.limit()
  }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
  pub items: Vec<T>,
  pub page: i64,
  pub page_size: i64,
  pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
  pub email: String,
  pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccount {
  pub email: Option<String>,
  pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSite {
  pub account_id: Uuid,
  pub domain: String,
  pub display_name: String,
}

/// The only response that ever carries a site's plaintext secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteResponse {
  pub site: Site,
  /// Server-generated. Shown exactly once; store it now.
  pub client_secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSite {
  pub display_name: Option<String>,
}

/// Filters for the admin batch listing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchQuery {
  pub site_id: Option<Uuid>,
  pub status: Option<BatchStatus>,
  pub page: i64,
  pub page_size: Option<i64>,
}

impl BatchQuery {
  pub fn pagination(&self) -> Pagination {
    Pagination {
      page: self.page,
      page_size: self.page_size,
    }
  }
}

/// `GET /api/admin/batch/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetail {
  #[serde(flatten)]
  pub batch: Batch,
  /// Domain of the owning site.
  pub domain: String,
  pub files: Vec<UploadedFile>,
}

/// Filters shared by the error log listing and the CSV export.
/// Export callers are expected to pass a bounded range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorLogQuery {
  pub site_id: Option<Uuid>,
  pub r#type: Option<String>,
  pub from: Option<DateTime<Utc>>,
  pub to: Option<DateTime<Utc>>,
  pub page: i64,
  pub page_size: Option<i64>,
}

impl ErrorLogQuery {
  pub fn pagination(&self) -> Pagination {
    Pagination {
      page: self.page,
      page_size: self.page_size,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pagination_clamps_and_offsets() {
    let default = Pagination::default();
    assert_eq!(default.limit(), Pagination::DEFAULT_PAGE_SIZE);
    assert_eq!(default.offset(), 0);

    let page_three = Pagination {
      page: 3,
      page_size: Some(20),
    };
    assert_eq!(page_three.limit(), 20);
    assert_eq!(page_three.offset(), 60);

    let oversized = Pagination {
      page: -2,
      page_size: Some(10_000),
    };
    assert_eq!(oversized.limit(), Pagination::MAX_PAGE_SIZE);
    assert_eq!(oversized.offset(), 0);

    let degenerate = Pagination {
      page: 1,
      page_size: Some(0),
    };
    assert_eq!(degenerate.limit(), 1);
  }
}
