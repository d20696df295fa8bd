mod test_leave_is_idempotent;
