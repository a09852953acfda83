/// Options for the construction of a [`crate::DriftClient`](crate::drift_client::DriftClient)
#[derive(Clone, Debug)]
pub struct ClientOpts {
    active_sub_account_id: u16,
    sub_account_ids: Vec<u16>,
}

impl Default for ClientOpts {
    fn default() -> Self {
        Self {
            active_sub_account_id: 0,
            sub_account_ids: vec![0],
        }
    }
}

impl ClientOpts {
    pub fn new(active_sub_account_id: u16, sub_account_ids: Option<Vec<u16>>) -> Self {
        let sub_account_ids = sub_account_ids.unwrap_or(vec![active_sub_account_id]);
        Self {
            active_sub_account_id,
            sub_account_ids,
        }
    }

    pub fn active_sub_account_id(&self) -> u16 {
        self.active_sub_account_id
    }

    pub fn sub_account_ids(&self) -> &[u16] {
        &self.sub_account_ids
    }
}
