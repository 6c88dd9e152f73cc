//! Short-lived memo of job listings and job details.
//!
//! Purely advisory: it saves round trips while the operator flips between jobs,
//! and a refresh simply clears it.

use crate::model::Job;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() <= ttl
    }
}

pub struct JobCache {
    ttl: Duration,
    listings: HashMap<bool, Cached<Vec<Job>>>,
    details: HashMap<i64, Cached<Job>>,
}

impl JobCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            listings: HashMap::new(),
            details: HashMap::new(),
        }
    }

    /// Cached listing for the given `expand_tasks` flag, if still fresh.
    pub fn listing(&self, expand_tasks: bool) -> Option<Vec<Job>> {
        self.listings
            .get(&expand_tasks)
            .filter(|c| c.fresh(self.ttl))
            .map(|c| c.value.clone())
    }

    pub fn store_listing(&mut self, expand_tasks: bool, jobs: Vec<Job>) {
        self.listings.insert(expand_tasks, Cached::new(jobs));
    }

    pub fn job(&self, job_id: i64) -> Option<Job> {
        self.details
            .get(&job_id)
            .filter(|c| c.fresh(self.ttl))
            .map(|c| c.value.clone())
    }

    pub fn store_job(&mut self, job: Job) {
        self.details.insert(job.job_id, Cached::new(job));
    }

    pub fn clear(&mut self) {
        self.listings.clear();
        self.details.clear();
    }
}
