mod test_link_loss_keeps_member;
