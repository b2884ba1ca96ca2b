use lexseg_core::metadata::MetadataFields;
use lexseg_core::ranges::PageRange;
use lexseg_core::records::{BulkWriteResult, FootnoteRecord, MetadataRecord, OpinionRecord};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};

use super::connection::DatabaseConnection;
use crate::prelude::*;

/// One upsert waiting in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    Footnote(FootnoteRecord),
    Opinion(OpinionRecord),
    Metadata(MetadataRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upserted {
    Inserted,
    Updated,
}

#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    // =========================================================================
    // Page ranges
    // =========================================================================

    /// Insert or replace page ranges keyed by (document, unit_no, start_page).
    pub fn upsert_page_ranges(&self, ranges: &[PageRange]) -> Result<BulkWriteResult> {
        self.db.transaction(|tx| {
            let mut result = BulkWriteResult::default();
            for range in ranges {
                let exists = tx
                    .query_row(
                        "SELECT 1 FROM page_ranges WHERE document = ?1 AND unit_no = ?2 AND start_page = ?3",
                        params![range.document, range.unit_no, range.start_page],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                tx.execute(
                    r#"
                    INSERT INTO page_ranges (document, unit_no, start_page, end_page)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(document, unit_no, start_page) DO UPDATE SET end_page = excluded.end_page
                    "#,
                    params![range.document, range.unit_no, range.start_page, range.end_page],
                )?;
                if exists {
                    result.updated += 1;
                } else {
                    result.inserted += 1;
                }
            }
            Ok(result)
        })
    }

    /// Every page range, optionally restricted to one document, ordered by
    /// document and start page.
    pub fn page_ranges(&self, document: Option<&str>) -> Result<Vec<PageRange>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT document, unit_no, start_page, end_page
                FROM page_ranges
                WHERE ?1 IS NULL OR document = ?1
                ORDER BY document, start_page, id
                "#,
            )?;
            let rows = stmt.query_map(params![document], |row| {
                Ok(PageRange {
                    document: row.get(0)?,
                    unit_no: row.get(1)?,
                    start_page: row.get(2)?,
                    end_page: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Apply a batch of upserts in order inside one transaction.
    ///
    /// A failing item is logged and counted; the remaining items still run
    /// and the batch is committed.
    pub fn bulk_upsert(&self, writes: &[PendingWrite]) -> Result<BulkWriteResult> {
        self.db.transaction(|tx| {
            let mut result = BulkWriteResult::default();
            for write in writes {
                match upsert_one(tx, write) {
                    Ok(Upserted::Inserted) => result.inserted += 1,
                    Ok(Upserted::Updated) => result.updated += 1,
                    Err(e) => {
                        warn!("Failed to write {}: {}", describe(write), e);
                        result.failed += 1;
                    }
                }
            }
            debug!(
                "Bulk upsert: {} inserted, {} updated, {} failed",
                result.inserted, result.updated, result.failed
            );
            Ok(result)
        })
    }

    pub fn footnotes(&self, document: &str) -> Result<Vec<FootnoteRecord>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT document, page, text, unit_no FROM footnotes WHERE document = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([document], |row| {
                Ok(FootnoteRecord {
                    document: row.get(0)?,
                    page: row.get(1)?,
                    text: row.get(2)?,
                    unit_no: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    pub fn opinions(&self, document: &str) -> Result<Vec<OpinionRecord>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT document, unit_id, start_page, end_page, content, links
                FROM opinions WHERE document = ?1 ORDER BY unit_id
                "#,
            )?;
            let rows = stmt.query_map([document], |row| {
                Ok((
                    OpinionRecord {
                        document: row.get(0)?,
                        unit_id: row.get(1)?,
                        start_page: row.get(2)?,
                        end_page: row.get(3)?,
                        content: row.get(4)?,
                        links: Vec::new(),
                    },
                    row.get::<_, String>(5)?,
                ))
            })?;

            let mut opinions = Vec::new();
            for row in rows {
                let (mut opinion, links) = row?;
                opinion.links = serde_json::from_str(&links)
                    .with_context(|| format!("Corrupt links for opinion {}", opinion.unit_id))?;
                opinions.push(opinion);
            }
            Ok(opinions)
        })
    }

    pub fn metadata(&self, document: &str, page: u32) -> Result<Option<MetadataRecord>> {
        self.db.execute(|conn| {
            let row = conn
                .query_row(
                    r#"
                    SELECT core_terms, judges, counsel, plaintiff_defendant,
                           opinion_by, prior_history, subsequent_history
                    FROM metadata WHERE document = ?1 AND page = ?2
                    "#,
                    params![document, page],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            MetadataFields {
                                core_terms: Vec::new(),
                                judges: row.get(1)?,
                                counsel: row.get(2)?,
                                plaintiff_defendant: row.get(3)?,
                                opinion_by: row.get(4)?,
                                prior_history: row.get(5)?,
                                subsequent_history: row.get(6)?,
                            },
                        ))
                    },
                )
                .optional()?;

            let Some((core_terms, mut fields)) = row else {
                return Ok(None);
            };
            fields.core_terms =
                serde_json::from_str(&core_terms).context("Corrupt core_terms column")?;
            Ok(Some(MetadataRecord {
                document: document.to_string(),
                page,
                fields,
            }))
        })
    }
}

fn describe(write: &PendingWrite) -> String {
    match write {
        PendingWrite::Footnote(r) => format!("footnote {}:{}", r.document, r.page),
        PendingWrite::Opinion(r) => format!("opinion {}#{}", r.document, r.unit_id),
        PendingWrite::Metadata(r) => format!("metadata {}:{}", r.document, r.page),
    }
}

fn upsert_one(conn: &Connection, write: &PendingWrite) -> Result<Upserted> {
    let exists = match write {
        PendingWrite::Footnote(r) => conn
            .query_row(
                "SELECT 1 FROM footnotes WHERE document = ?1 AND page = ?2 AND text = ?3",
                params![r.document, r.page, r.text],
                |_| Ok(()),
            )
            .optional()?,
        PendingWrite::Opinion(r) => conn
            .query_row(
                "SELECT 1 FROM opinions WHERE document = ?1 AND unit_id = ?2",
                params![r.document, r.unit_id],
                |_| Ok(()),
            )
            .optional()?,
        PendingWrite::Metadata(r) => conn
            .query_row(
                "SELECT 1 FROM metadata WHERE document = ?1 AND page = ?2",
                params![r.document, r.page],
                |_| Ok(()),
            )
            .optional()?,
    }
    .is_some();

    match write {
        PendingWrite::Footnote(r) => {
            conn.execute(
                r#"
                INSERT INTO footnotes (document, page, text, unit_no) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(document, page, text) DO UPDATE SET unit_no = excluded.unit_no
                "#,
                params![r.document, r.page, r.text, r.unit_no],
            )?;
        }
        PendingWrite::Opinion(r) => {
            let links = serde_json::to_string(&r.links)?;
            conn.execute(
                r#"
                INSERT INTO opinions (document, unit_id, start_page, end_page, content, links)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(document, unit_id) DO UPDATE SET
                    start_page = excluded.start_page,
                    end_page = excluded.end_page,
                    content = excluded.content,
                    links = excluded.links
                "#,
                params![r.document, r.unit_id, r.start_page, r.end_page, r.content, links],
            )?;
        }
        PendingWrite::Metadata(r) => {
            let f = &r.fields;
            let core_terms = serde_json::to_string(&f.core_terms)?;
            conn.execute(
                r#"
                INSERT INTO metadata (
                    document, page, core_terms, judges, counsel, plaintiff_defendant,
                    opinion_by, prior_history, subsequent_history
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(document, page) DO UPDATE SET
                    core_terms = excluded.core_terms,
                    judges = excluded.judges,
                    counsel = excluded.counsel,
                    plaintiff_defendant = excluded.plaintiff_defendant,
                    opinion_by = excluded.opinion_by,
                    prior_history = excluded.prior_history,
                    subsequent_history = excluded.subsequent_history
                "#,
                params![
                    r.document,
                    r.page,
                    core_terms,
                    f.judges,
                    f.counsel,
                    f.plaintiff_defendant,
                    f.opinion_by,
                    f.prior_history,
                    f.subsequent_history,
                ],
            )?;
        }
    }

    Ok(if exists {
        Upserted::Updated
    } else {
        Upserted::Inserted
    })
}

#[cfg(test)]
mod tests {
    use lexseg_core::segment::Hyperlink;

    use super::*;

    fn range(document: &str, unit_no: &str, start: u32, end: Option<u32>) -> PageRange {
        PageRange {
            document: document.to_string(),
            unit_no: unit_no.to_string(),
            start_page: start,
            end_page: end,
        }
    }

    fn footnote(page: u32, text: &str, unit_no: Option<&str>) -> PendingWrite {
        PendingWrite::Footnote(FootnoteRecord {
            document: "cp01.pdf".to_string(),
            page,
            text: text.to_string(),
            unit_no: unit_no.map(str::to_string),
        })
    }

    #[test]
    fn test_page_ranges_upsert_and_filter() {
        let repo = Repository::new_in_memory().unwrap();
        let first = repo
            .upsert_page_ranges(&[
                range("cp02.pdf", "B", 1, None),
                range("cp01.pdf", "A2", 10, Some(19)),
                range("cp01.pdf", "A1", 1, Some(9)),
            ])
            .unwrap();
        assert_eq!(first.inserted, 3);

        let again = repo
            .upsert_page_ranges(&[range("cp01.pdf", "A2", 10, Some(20))])
            .unwrap();
        assert_eq!(again.updated, 1);

        let cp01 = repo.page_ranges(Some("cp01.pdf")).unwrap();
        assert_eq!(cp01.len(), 2);
        assert_eq!(cp01[0].unit_no, "A1");
        assert_eq!(cp01[1].end_page, Some(20));

        let all = repo.page_ranges(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].document, "cp02.pdf");
        assert_eq!(all[2].end_page, None);
    }

    #[test]
    fn test_footnote_rerun_updates_unit_no() {
        let repo = Repository::new_in_memory().unwrap();

        let first = repo.bulk_upsert(&[footnote(3, "1 See id.", None)]).unwrap();
        assert_eq!(first.inserted, 1);

        let second = repo
            .bulk_upsert(&[
                footnote(3, "1 See id.", Some("A")),
                footnote(4, "2 Ibid.", Some("A")),
            ])
            .unwrap();
        assert_eq!((second.inserted, second.updated, second.failed), (1, 1, 0));

        let stored = repo.footnotes("cp01.pdf").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].unit_no.as_deref(), Some("A"));
    }

    #[test]
    fn test_opinion_round_trips_links() {
        let repo = Repository::new_in_memory().unwrap();
        let opinion = OpinionRecord {
            document: "cp01.pdf".to_string(),
            unit_id: 0,
            start_page: 2,
            end_page: 5,
            content: "Opinion GRONER, J. The judgment is affirmed.".to_string(),
            links: vec![Hyperlink {
                raw_text: "309 U.S. 686".to_string(),
                link: "https://example.com/309us686".to_string(),
            }],
        };
        repo.bulk_upsert(&[PendingWrite::Opinion(opinion.clone())])
            .unwrap();

        let mut changed = opinion.clone();
        changed.end_page = 6;
        let result = repo.bulk_upsert(&[PendingWrite::Opinion(changed)]).unwrap();
        assert_eq!(result.updated, 1);

        let stored = repo.opinions("cp01.pdf").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].end_page, 6);
        assert_eq!(stored[0].links, opinion.links);
    }

    #[test]
    fn test_metadata_is_keyed_by_page() {
        let repo = Repository::new_in_memory().unwrap();
        let record = MetadataRecord {
            document: "cp01.pdf".to_string(),
            page: 7,
            fields: MetadataFields {
                core_terms: vec!["contract".to_string(), "breach".to_string()],
                judges: "GRONER".to_string(),
                ..Default::default()
            },
        };
        repo.bulk_upsert(&[PendingWrite::Metadata(record.clone())])
            .unwrap();

        assert_eq!(repo.metadata("cp01.pdf", 7).unwrap(), Some(record));
        assert_eq!(repo.metadata("cp01.pdf", 8).unwrap(), None);
    }

    #[test]
    fn test_failed_item_does_not_stop_batch() {
        let repo = Repository::new_in_memory().unwrap();
        repo.db
            .execute(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_bad BEFORE INSERT ON footnotes
                     WHEN NEW.text = 'bad' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let result = repo
            .bulk_upsert(&[
                footnote(1, "good", None),
                footnote(2, "bad", None),
                footnote(3, "also good", None),
            ])
            .unwrap();
        assert_eq!((result.inserted, result.failed), (2, 1));

        let pages: Vec<u32> = repo
            .footnotes("cp01.pdf")
            .unwrap()
            .iter()
            .map(|r| r.page)
            .collect();
        assert_eq!(pages, vec![1, 3]);
    }
}
