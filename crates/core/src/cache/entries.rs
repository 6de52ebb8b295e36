//! Entry operations inside a cache generation.
//!
//! Only GET requests are stored. Entries carry no expiry metadata; freshness
//! is entirely up to the strategy that reads them.

use super::connection::CacheDb;
use super::generations::Generation;
use super::hash::compute_entry_key;
use crate::{Error, Request, Response, ResponseKind};
use bytes::Bytes;
use tokio_rusqlite::{params, rusqlite};

const SELECT_RESPONSE: &str = "SELECT e.response_url, e.status, e.status_text, e.kind, e.headers_json, e.body
     FROM cache_entries e JOIN cache_generations g ON g.id = e.generation_id";

/// Columns as stored, decoded outside the rusqlite row callback.
struct StoredResponse {
    url: String,
    status: u16,
    status_text: String,
    kind: String,
    headers_json: String,
    body: Vec<u8>,
}

impl StoredResponse {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            status: row.get(1)?,
            status_text: row.get(2)?,
            kind: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Response, Error> {
        let kind: ResponseKind = self.kind.parse()?;
        let headers: Vec<(String, String)> =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;

        Ok(Response {
            url: self.url,
            status: self.status,
            status_text: self.status_text,
            kind,
            headers,
            body: Bytes::from(self.body),
        })
    }
}

fn request_url(request: &Request) -> String {
    let mut url = request.url.clone();
    url.set_fragment(None);
    url.to_string()
}

impl Generation {
    /// Look up the stored response for a request.
    ///
    /// Non-GET requests never match.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }

        let name = self.name.clone();
        let key_hash = compute_entry_key(&request.method, &request.url);
        let stored = self
            .db
            .conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_RESPONSE} WHERE g.name = ?1 AND e.key_hash = ?2"))?;

                match stmt.query_row(params![name, key_hash], StoredResponse::from_row) {
                    Ok(stored) => Ok(Some(stored)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        stored.map(StoredResponse::decode).transpose()
    }

    /// Store a response for a request, overwriting any previous entry.
    ///
    /// Fails with `INVALID_INPUT` for non-GET requests and with
    /// `GENERATION_MISSING` if the generation was deleted in the meantime.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("cannot cache {} requests", request.method)));
        }

        let name = self.name.clone();
        let key_hash = compute_entry_key(&request.method, &request.url);
        let method = request.method.clone();
        let url = request_url(request);
        let headers_json = serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let response = response.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        let written = self
            .db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count = conn.execute(
                    "INSERT INTO cache_entries (
                        generation_id, key_hash, method, url, response_url,
                        status, status_text, kind, headers_json, body, stored_at
                    )
                    SELECT id, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
                    FROM cache_generations WHERE name = ?1
                    ON CONFLICT(generation_id, key_hash) DO UPDATE SET
                        response_url = excluded.response_url,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        kind = excluded.kind,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        name,
                        key_hash,
                        method,
                        url,
                        &response.url,
                        response.status,
                        &response.status_text,
                        response.kind.as_str(),
                        headers_json,
                        response.body.to_vec(),
                        stored_at,
                    ],
                )?;
                Ok(count)
            })
            .await
            .map_err(Error::from)?;

        if written == 0 {
            return Err(Error::GenerationMissing(self.name.clone()));
        }

        Ok(())
    }

    /// Request URLs stored in this generation, oldest first.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.url FROM cache_entries e
                     JOIN cache_generations g ON g.id = e.generation_id
                     WHERE g.name = ?1 ORDER BY e.rowid ASC",
                )?;
                let urls = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Look a request up across every generation, oldest generation first.
    pub async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }

        let key_hash = compute_entry_key(&request.method, &request.url);
        let stored = self
            .conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_RESPONSE} WHERE e.key_hash = ?1 ORDER BY g.id ASC LIMIT 1"))?;

                match stmt.query_row(params![key_hash], StoredResponse::from_row) {
                    Ok(stored) => Ok(Some(stored)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        stored.map(StoredResponse::decode).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestMode;

    fn get(url: &str) -> Request {
        Request::new("GET", url, RequestMode::NoCors).unwrap()
    }

    fn make_test_response(url: &str, body: &'static str) -> Response {
        Response {
            url: url.to_string(),
            status: 200,
            status_text: "OK".to_string(),
            kind: ResponseKind::Basic,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_generation("ai-chat-v1").await.unwrap();
        let req = get("http://localhost:8080/index.html");
        let resp = make_test_response("http://localhost:8080/index.html", "<html>shell</html>");

        shell.put(&req, &resp).await.unwrap();

        let cached = shell.match_request(&req).await.unwrap().unwrap();
        assert_eq!(cached, resp);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_generation("ai-chat-v1").await.unwrap();
        let result = shell.match_request(&get("http://localhost:8080/nope")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cdn = db.open_generation("ai-chat-cdn-v1").await.unwrap();
        let req = get("https://cdn.jsdelivr.net/npm/marked.js");

        cdn.put(&req, &make_test_response(req.url.as_str(), "old")).await.unwrap();
        cdn.put(&req, &make_test_response(req.url.as_str(), "new")).await.unwrap();

        let cached = cdn.match_request(&req).await.unwrap().unwrap();
        assert_eq!(cached.body, Bytes::from_static(b"new"));
        assert_eq!(cdn.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_generation("ai-chat-v1").await.unwrap();
        let req = Request::new("POST", "http://localhost:8080/form", RequestMode::SameOrigin).unwrap();

        let result = shell.put(&req, &make_test_response(req.url.as_str(), "")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(shell.match_request(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_generation("ai-chat-v1").await.unwrap();
        let cdn = db.open_generation("ai-chat-cdn-v1").await.unwrap();
        let req = get("http://localhost:8080/index.html");

        shell.put(&req, &make_test_response(req.url.as_str(), "shell")).await.unwrap();

        assert!(cdn.match_request(&req).await.unwrap().is_none());
        assert!(db.match_any(&req).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_after_delete_does_not_resurrect() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stale = db.open_generation("ai-chat-v0").await.unwrap();
        let req = get("http://localhost:8080/app.js");
        stale.put(&req, &make_test_response(req.url.as_str(), "v0")).await.unwrap();

        db.delete_generation("ai-chat-v0").await.unwrap();

        let result = stale.put(&req, &make_test_response(req.url.as_str(), "v0")).await;
        assert!(matches!(result, Err(Error::GenerationMissing(_))));
        assert!(db.generation_names().await.unwrap().is_empty());
        assert!(db.match_any(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_generation("ai-chat-v1").await.unwrap();
        let index = get("http://localhost:8080/index.html");
        let manifest = get("http://localhost:8080/manifest.json");

        shell.put(&index, &make_test_response(index.url.as_str(), "i")).await.unwrap();
        shell.put(&manifest, &make_test_response(manifest.url.as_str(), "m")).await.unwrap();
        assert_eq!(
            shell.keys().await.unwrap(),
            vec!["http://localhost:8080/index.html", "http://localhost:8080/manifest.json"]
        );

        // Overwriting keeps an entry's position.
        shell.put(&index, &make_test_response(index.url.as_str(), "i2")).await.unwrap();
        assert_eq!(shell.keys().await.unwrap()[0], "http://localhost:8080/index.html");
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let older = db.open_generation("ai-chat-v1").await.unwrap();
        let newer = db.open_generation("ai-chat-cdn-v1").await.unwrap();
        let req = get("http://localhost:8080/index.html");

        newer.put(&req, &make_test_response(req.url.as_str(), "newer")).await.unwrap();
        older.put(&req, &make_test_response(req.url.as_str(), "older")).await.unwrap();

        let found = db.match_any(&req).await.unwrap().unwrap();
        assert_eq!(found.body, Bytes::from_static(b"older"));
    }

    #[tokio::test]
    async fn test_fragment_shares_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_generation("ai-chat-v1").await.unwrap();
        shell
            .put(&get("http://localhost:8080/#chat"), &make_test_response("http://localhost:8080/", "root"))
            .await
            .unwrap();

        assert!(shell.match_request(&get("http://localhost:8080/")).await.unwrap().is_some());
        assert_eq!(shell.keys().await.unwrap(), vec!["http://localhost:8080/"]);
    }

    #[tokio::test]
    async fn test_deleting_generation_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_generation("ai-chat-v1").await.unwrap();
        let req = get("http://localhost:8080/index.html");
        shell.put(&req, &make_test_response(req.url.as_str(), "x")).await.unwrap();

        db.delete_generation("ai-chat-v1").await.unwrap();
        let reopened = db.open_generation("ai-chat-v1").await.unwrap();

        assert!(reopened.match_request(&req).await.unwrap().is_none());
    }
}
